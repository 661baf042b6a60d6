//! Keeps denormalized reference fields consistent with the entities they point to.
//!
//! Every [`Relation`] of a schema pairs a persisted id field (`One`) or id-list (`Many`)
//! with a navigation field. On lookup the [`DependencyResolver`] fetches the referenced
//! documents in one query per relation and then:
//!
//! - prunes ids that no longer resolve, keeping the order of the rest,
//! - clears a single reference that no longer resolves,
//! - optionally fills the navigation field with the referenced documents.
//!
//! Pruned fields are reported in a [`ChangeSet`] so the caller can persist them.
//!
//! Pruning only asks whether a referenced entity exists. Hydration additionally skips
//! entities the caller may not access when the resolver was built
//! [`with_access`](DependencyResolver::with_access).

use std::collections::{HashMap, HashSet};

use bson::{Bson, Document, Uuid};
use tracing::warn;

use crate::{
    access::AccessControl,
    backend::StoreBackend,
    cancel::CancelToken,
    context::Caller,
    diff::ChangeSet,
    document::{bson_to_id, bson_to_ids, ids_to_bson},
    error::DocumentStoreResult,
    query::{Filter, Query},
    schema::{Cardinality, EntitySchema, Relation},
};

/// What a lookup does besides fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    /// Remove ids that no longer resolve.
    pub prune: bool,
    /// Fill navigation fields.
    pub hydrate: bool,
}

impl ResolveOptions {
    pub fn prune() -> Self {
        Self { prune: true, hydrate: false }
    }

    pub fn hydrate() -> Self {
        Self { prune: false, hydrate: true }
    }

    pub fn prune_and_hydrate() -> Self {
        Self { prune: true, hydrate: true }
    }
}

#[derive(Debug)]
pub struct DependencyResolver<'a, B: StoreBackend> {
    backend: &'a B,
    schema: &'static EntitySchema,
    viewer: Option<(&'a dyn AccessControl, &'a Caller)>,
}

impl<'a, B: StoreBackend> DependencyResolver<'a, B> {
    pub fn new(backend: &'a B, schema: &'static EntitySchema) -> Self {
        Self {
            backend,
            schema,
            viewer: None,
        }
    }

    /// Hydrates only the referenced entities `caller` may access.
    pub fn with_access(mut self, access: &'a dyn AccessControl, caller: &'a Caller) -> Self {
        self.viewer = Some((access, caller));
        self
    }

    /// Resolves every relation of `document`, or only those whose id field is named in `only`.
    pub async fn resolve(
        &self,
        document: &mut Document,
        options: ResolveOptions,
        only: Option<&[&str]>,
        cancel: &CancelToken,
    ) -> DocumentStoreResult<ChangeSet> {
        let mut changes = ChangeSet::new();

        for relation in self.relations(only) {
            let ids = referenced_ids(relation, document);
            let found = self.fetch(relation, &ids, cancel).await?;
            let hidden = if options.hydrate {
                self.hidden(relation, &found).await?
            } else {
                HashSet::new()
            };

            if let Some(value) = apply_lookup(relation, document, &found, &hidden, options) {
                warn!(
                    collection = self.schema.collection,
                    field = relation.id_field,
                    target = relation.target,
                    "pruned references to missing entities"
                );
                changes.insert(relation.id_field, value);
            }
        }

        Ok(changes)
    }

    /// Fills the navigation fields of many documents with one query per relation. Nothing is pruned.
    pub async fn hydrate_all(&self, documents: &mut [Document], cancel: &CancelToken) -> DocumentStoreResult<()> {
        for relation in self.schema.relations {
            let mut ids = Vec::new();

            for document in documents.iter() {
                for id in referenced_ids(relation, document) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }

            let found = self.fetch(relation, &ids, cancel).await?;
            let hidden = self.hidden(relation, &found).await?;

            for document in documents.iter_mut() {
                apply_lookup(relation, document, &found, &hidden, ResolveOptions::hydrate());
            }
        }

        Ok(())
    }

    /// Whether an entity with `id` exists in `collection`.
    pub async fn exists(&self, collection: &str, id: Uuid, cancel: &CancelToken) -> DocumentStoreResult<bool> {
        let count = cancel
            .race(self.backend.count(Some(Filter::eq("id", id)), collection))
            .await??;

        Ok(count > 0)
    }

    fn relations<'s>(&'s self, only: Option<&'s [&'s str]>) -> impl Iterator<Item = &'static Relation> + 's {
        self.schema.relations.iter().filter(move |relation| {
            only.is_none_or(|names| {
                names.iter().any(|name| {
                    self.schema
                        .relation(name)
                        .is_some_and(|named| named.id_field == relation.id_field)
                })
            })
        })
    }

    async fn fetch(
        &self,
        relation: &Relation,
        ids: &[Uuid],
        cancel: &CancelToken,
    ) -> DocumentStoreResult<HashMap<Uuid, Document>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = Query::filtered(Some(Filter::any_of("id", ids_to_bson(ids))));
        let documents = cancel
            .race(self.backend.find(query, relation.target))
            .await??;

        Ok(documents
            .into_iter()
            .filter_map(|document| {
                let id = document.get("id").and_then(bson_to_id)?;
                Some((id, document))
            })
            .collect())
    }
}

impl<B: StoreBackend> DependencyResolver<'_, B> {
    /// Ids among `found` the viewer may not access.
    async fn hidden(&self, relation: &Relation, found: &HashMap<Uuid, Document>) -> DocumentStoreResult<HashSet<Uuid>> {
        let Some((access, caller)) = self.viewer else {
            return Ok(HashSet::new());
        };
        if found.is_empty() {
            return Ok(HashSet::new());
        }

        let ids = found.keys().copied().collect::<Vec<_>>();
        let accessible = access
            .accessible_ids(relation.target, &ids, caller)
            .await?
            .into_iter()
            .collect::<HashSet<_>>();

        Ok(ids.into_iter().filter(|id| !accessible.contains(id)).collect())
    }
}

/// Ids currently stored in the relation's id field.
pub fn referenced_ids(relation: &Relation, document: &Document) -> Vec<Uuid> {
    let value = document.get(relation.id_field).unwrap_or(&Bson::Null);

    match relation.cardinality {
        Cardinality::Many => bson_to_ids(value),
        Cardinality::One => bson_to_id(value).into_iter().collect(),
    }
}

/// Applies fetched documents to `document`. Returns the new id field value when references were pruned.
///
/// `hidden` entities still count as existing but are left out of the navigation field.
fn apply_lookup(
    relation: &Relation,
    document: &mut Document,
    found: &HashMap<Uuid, Document>,
    hidden: &HashSet<Uuid>,
    options: ResolveOptions,
) -> Option<Bson> {
    let ids = referenced_ids(relation, document);
    let kept = ids
        .iter()
        .copied()
        .filter(|id| found.contains_key(id))
        .collect::<Vec<_>>();

    let pruned = if options.prune && kept.len() != ids.len() {
        let value = match relation.cardinality {
            Cardinality::Many => ids_to_bson(&kept),
            Cardinality::One => Bson::Null,
        };
        document.insert(relation.id_field, value.clone());
        Some(value)
    } else {
        None
    };

    if options.hydrate {
        let shown = kept.iter().filter(|id| !hidden.contains(*id));
        let navigation = match relation.cardinality {
            Cardinality::Many => Bson::Array(
                shown
                    .filter_map(|id| found.get(id).cloned().map(Bson::Document))
                    .collect(),
            ),
            Cardinality::One => shown
                .into_iter()
                .next()
                .and_then(|id| found.get(id).cloned())
                .map(Bson::Document)
                .unwrap_or(Bson::Null),
        };
        document.insert(relation.navigation, navigation);
    }

    pruned
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    static CATEGORIES: Relation = Relation::many("category_ids", "categories", "categories");
    static MANAGER: Relation = Relation::one("manager_id", "manager", "contacts");

    fn found(ids: &[Uuid]) -> HashMap<Uuid, Document> {
        ids.iter()
            .map(|id| (*id, doc! { "id": *id, "name": id.to_string() }))
            .collect()
    }

    #[test]
    fn missing_ids_are_pruned_in_order() {
        let (a, b, c) = (Uuid::new(), Uuid::new(), Uuid::new());
        let mut document = doc! { "category_ids": [a, b, c] };

        let pruned = apply_lookup(&CATEGORIES, &mut document, &found(&[c, a]), &HashSet::new(), ResolveOptions::prune());

        assert_eq!(pruned, Some(ids_to_bson(&[a, c])));
        assert_eq!(referenced_ids(&CATEGORIES, &document), vec![a, c]);
        assert!(!document.contains_key("categories"));
    }

    #[test]
    fn complete_lists_are_left_alone() {
        let (a, b) = (Uuid::new(), Uuid::new());
        let mut document = doc! { "category_ids": [a, b] };

        assert_eq!(apply_lookup(&CATEGORIES, &mut document, &found(&[a, b]), &HashSet::new(), ResolveOptions::prune()), None);
    }

    #[test]
    fn dangling_single_references_are_cleared() {
        let mut document = doc! { "manager_id": Uuid::new() };

        let pruned = apply_lookup(&MANAGER, &mut document, &HashMap::new(), &HashSet::new(), ResolveOptions::prune_and_hydrate());

        assert_eq!(pruned, Some(Bson::Null));
        assert_eq!(document.get("manager_id"), Some(&Bson::Null));
        assert_eq!(document.get("manager"), Some(&Bson::Null));
    }

    #[test]
    fn hydration_follows_id_order() {
        let (a, b) = (Uuid::new(), Uuid::new());
        let mut document = doc! { "category_ids": [b, a], "manager_id": a };

        apply_lookup(&CATEGORIES, &mut document, &found(&[a, b]), &HashSet::new(), ResolveOptions::hydrate());
        apply_lookup(&MANAGER, &mut document, &found(&[a]), &HashSet::new(), ResolveOptions::hydrate());

        let names = document
            .get_array("categories")
            .unwrap()
            .iter()
            .map(|item| item.as_document().unwrap().get_str("name").unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec![b.to_string(), a.to_string()]);
        assert_eq!(document.get_document("manager").unwrap().get_str("name").unwrap(), a.to_string());
    }

    #[test]
    fn hidden_references_are_kept_but_not_hydrated() {
        let (a, b) = (Uuid::new(), Uuid::new());
        let mut document = doc! { "category_ids": [a, b], "manager_id": b };
        let hidden = HashSet::from([b]);

        let pruned = apply_lookup(&CATEGORIES, &mut document, &found(&[a, b]), &hidden, ResolveOptions::prune_and_hydrate());
        apply_lookup(&MANAGER, &mut document, &found(&[b]), &hidden, ResolveOptions::prune_and_hydrate());

        assert_eq!(pruned, None);
        assert_eq!(referenced_ids(&CATEGORIES, &document), vec![a, b]);
        assert_eq!(document.get_array("categories").unwrap().len(), 1);
        assert_eq!(document.get("manager_id"), Some(&Bson::from(b)));
        assert_eq!(document.get("manager"), Some(&Bson::Null));
    }

    #[test]
    fn hydration_alone_never_prunes() {
        let mut document = doc! { "category_ids": [Uuid::new()] };

        assert_eq!(apply_lookup(&CATEGORIES, &mut document, &HashMap::new(), &HashSet::new(), ResolveOptions::hydrate()), None);
        assert_eq!(referenced_ids(&CATEGORIES, &document).len(), 1);
    }
}
