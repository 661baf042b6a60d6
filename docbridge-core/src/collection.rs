//! Entity operations.
//!
//! [`EntityCollection`] sequences the planning stages around every operation on one
//! entity type:
//!
//! | operation | sequence |
//! |---|---|
//! | [`add`](EntityCollection::add) | normalize, duplicate id and name checks, prune references, stamp, insert |
//! | [`get`](EntityCollection::get) | visibility filter, access check, optional prune and hydrate |
//! | [`update`](EntityCollection::update) | load, prune, diff, versioned field update |
//! | [`update_delta`](EntityCollection::update_delta) | load, prune touched relations, delta plan, versioned field update |
//! | [`bulk_update`](EntityCollection::bulk_update) / [`bulk_delete`](EntityCollection::bulk_delete) | restrict to accessible ids, prune touched references, then one multi-document write |
//! | [`search`](EntityCollection::search) | predicate compiler, sort plan, access narrowing, page window |
//! | [`delete`](EntityCollection::delete) | existence check, delete |
//!
//! Every operation returns an [`OperationResult`]; store errors are logged and sanitized
//! at this boundary.
//!
//! # Example
//!
//! ```ignore
//! let contacts = store.collection::<PhoneBookContact>();
//! let ctx = OperationContext::new(Caller::user("jdoe"));
//!
//! let added = contacts.add(&ctx, contact).await;
//! let page = contacts
//!     .search(&ctx, SearchParameters::builder().query("mei").page_size(10).build())
//!     .await;
//! ```

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    marker::PhantomData,
};

use bson::{Bson, Document, Uuid};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, error, info_span, warn};

use crate::{
    access::AccessControl,
    backend::{FieldUpdate, StoreBackend},
    cancel::CancelToken,
    config::EngineConfig,
    context::OperationContext,
    delta::{Delta, DeltaApplier},
    diff::{ChangeSet, DiffEngine},
    document::{Entity, EntityExt, bson_to_id, bson_to_ids, ids_to_bson},
    error::{DocumentStoreResult, OperationError, StoreResultExt},
    page::{PageWindow, SearchResults},
    predicate::PredicateCompiler,
    query::{Expr, Filter, Query, SortDirection},
    relation::{DependencyResolver, ResolveOptions},
    result::OperationResult,
    schema::{Cardinality, EntitySchema, FieldRole, Relation},
    search::SearchParameters,
    sort::{SortKey, SortPlan, as_number, compare_values, lookup_path},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetOptions {
    /// Prune dangling references and hydrate navigation fields.
    pub lookup: bool,
}

impl GetOptions {
    pub fn lookup() -> Self {
        Self { lookup: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOptions {
    /// Also write dependency fields. Falls back to [`EngineConfig::include_dependency_fields`].
    pub include_dependency_fields: Option<bool>,
}

impl UpdateOptions {
    pub fn with_dependency_fields() -> Self {
        Self { include_dependency_fields: Some(true) }
    }
}

/// An entity as read, with the reference fields pruned while reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<E> {
    pub entity: E,
    pub changed_fields: Vec<String>,
}

/// Fields written by an update. Empty for a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub id: Uuid,
    pub changed_fields: Vec<String>,
}

impl ChangeSummary {
    fn unchanged(id: Uuid) -> Self {
        Self { id, changed_fields: Vec::new() }
    }

    pub fn is_noop(&self) -> bool {
        self.changed_fields.is_empty()
    }
}

/// Assigns the included properties of `template` to every listed entity.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkUpdate<E> {
    pub ids: Vec<Uuid>,
    pub included_properties: Vec<String>,
    pub template: E,
}

impl<E> BulkUpdate<E> {
    pub fn new(ids: impl IntoIterator<Item = Uuid>, template: E) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            included_properties: Vec::new(),
            template,
        }
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.included_properties.push(name.into());
        self
    }
}

/// The collection of one entity type.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend and access-control references
/// * `B` - The storage backend type
/// * `A` - The access-control collaborator
/// * `E` - The entity type
#[derive(Debug)]
pub struct EntityCollection<'a, B: StoreBackend, A: AccessControl, E: Entity> {
    backend: &'a B,
    access: &'a A,
    config: EngineConfig,
    _marker: PhantomData<E>,
}

impl<'a, B: StoreBackend, A: AccessControl, E: Entity> EntityCollection<'a, B, A, E> {
    pub(crate) fn new(backend: &'a B, access: &'a A, config: EngineConfig) -> Self {
        Self {
            backend,
            access,
            config,
            _marker: PhantomData,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &'static str {
        E::collection_name()
    }

    fn schema(&self) -> &'static EntitySchema {
        E::schema()
    }

    fn resolver(&self) -> DependencyResolver<'a, B> {
        DependencyResolver::new(self.backend, self.schema())
    }

    /// A resolver that hydrates only what the caller may access.
    fn viewing_resolver<'c>(&'c self, ctx: &'c OperationContext) -> DependencyResolver<'c, B> {
        DependencyResolver::new(self.backend, self.schema()).with_access(self.access, &ctx.caller)
    }

    fn at(&self, operation: &str) -> String {
        format!("{}::{operation}", self.name())
    }

    /// Inserts a new entity and returns it as stored.
    ///
    /// An unassigned (nil) id is replaced by a new one. Fails with `DuplicateObject` when
    /// the id is taken, and with `DuplicateName` when name validation is enabled and
    /// another entity carries the same name, ignoring case.
    pub async fn add(&self, ctx: &OperationContext, entity: E) -> OperationResult<E> {
        let location = self.at("add");
        let span = info_span!("add", collection = self.name(), id = %entity.id());

        async { report(&location, self.try_add(ctx, entity, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_add(&self, ctx: &OperationContext, mut entity: E, location: &str) -> Result<E, OperationError> {
        entity.normalize();

        if entity.has_unassigned_id() {
            entity.set_id(Uuid::new());
        }

        let id = *entity.id();

        if self.exists(id, &ctx.cancel).await.in_operation(location)? {
            return Err(OperationError::DuplicateObject(id.to_string()));
        }

        let mut document = entity.to_document().in_operation(location)?;
        self.strip_navigation(&mut document);

        if self.config.validate_unique_names {
            self.check_unique_name(&document, id, &ctx.cancel, location)
                .await?;
        }

        for relation in self.schema().relations {
            if relation.cardinality == Cardinality::Many
                && !matches!(document.get(relation.id_field), Some(Bson::Array(_)))
            {
                document.insert(relation.id_field, Bson::Array(Vec::new()));
            }
        }

        self.resolver()
            .resolve(&mut document, ResolveOptions::prune(), None, &ctx.cancel)
            .await
            .in_operation(location)?;

        for (field, value) in self.stamps(ctx) {
            document.insert(field, value);
        }

        if let Some(field) = self.schema().version_field() {
            document.insert(field, Bson::Int64(0));
        }

        ctx.cancel.check().in_operation(location)?;
        self.backend
            .insert_one(id, document.clone(), self.name())
            .await
            .in_operation(location)?;

        debug!(collection = self.name(), %id, "added entity");

        E::from_document(document).in_operation(location)
    }

    /// Reads one entity.
    ///
    /// With [`GetOptions::lookup`], references to missing entities are pruned (and written
    /// back when configured) and navigation fields are hydrated.
    pub async fn get(&self, ctx: &OperationContext, id: Uuid, options: GetOptions) -> OperationResult<Resolved<E>> {
        let location = self.at("get");
        let span = info_span!("get", collection = self.name(), %id, lookup = options.lookup);

        async { report(&location, self.try_get(ctx, id, options, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_get(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        options: GetOptions,
        location: &str,
    ) -> Result<Resolved<E>, OperationError> {
        let mut document = self.load(ctx, id, location).await?;
        let mut changes = ChangeSet::new();

        if options.lookup {
            let expected_version = self.version_of(&document);

            changes = self
                .viewing_resolver(ctx)
                .resolve(&mut document, ResolveOptions::prune_and_hydrate(), None, &ctx.cancel)
                .await
                .in_operation(location)?;

            if !changes.is_empty() && self.config.persist_pruned_references {
                if let Err(err) = self
                    .write_changes(ctx, id, expected_version, changes.clone(), false, location)
                    .await
                {
                    warn!(collection = self.name(), %id, error = %err, "could not persist pruned references");
                }
            }
        }

        Ok(Resolved {
            entity: E::from_document(document).in_operation(location)?,
            changed_fields: changes.fields(),
        })
    }

    /// Replaces the stored entity's data with `entity`, writing only the fields that differ.
    pub async fn update(&self, ctx: &OperationContext, entity: E, options: UpdateOptions) -> OperationResult<ChangeSummary> {
        let location = self.at("update");
        let span = info_span!("update", collection = self.name(), id = %entity.id());

        async { report(&location, self.try_update(ctx, entity, options, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_update(
        &self,
        ctx: &OperationContext,
        mut entity: E,
        options: UpdateOptions,
        location: &str,
    ) -> Result<ChangeSummary, OperationError> {
        let id = *entity.id();
        let existing = self.load(ctx, id, location).await?;

        entity.normalize();
        let mut proposed = entity.to_document().in_operation(location)?;

        let include_dependencies = options
            .include_dependency_fields
            .unwrap_or(self.config.include_dependency_fields);

        if include_dependencies && self.config.lookup_on_update {
            self.resolver()
                .resolve(&mut proposed, ResolveOptions::prune(), None, &ctx.cancel)
                .await
                .in_operation(location)?;
        }

        let changes = DiffEngine::new(self.schema())
            .with_dependency_fields(include_dependencies)
            .diff(&existing, &proposed);

        self.commit(ctx, id, &existing, changes, location).await
    }

    /// Writes the properties and paths named by `delta`, and nothing else.
    pub async fn update_delta(&self, ctx: &OperationContext, delta: Delta<E>) -> OperationResult<ChangeSummary> {
        let location = self.at("update_delta");
        let span = info_span!("update_delta", collection = self.name(), id = %delta.id);

        async { report(&location, self.try_update_delta(ctx, delta, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_update_delta(
        &self,
        ctx: &OperationContext,
        delta: Delta<E>,
        location: &str,
    ) -> Result<ChangeSummary, OperationError> {
        let id = delta.id;
        let existing = self.load(ctx, id, location).await?;

        if delta.is_empty() {
            debug!(collection = self.name(), %id, "delta names no properties");
            return Ok(ChangeSummary::unchanged(id));
        }

        let mut data = delta.data.clone();
        data.set_id(id);
        data.normalize();
        let mut patch = data.to_document().in_operation(location)?;

        let roots = delta.roots();
        let touches_relation = self
            .schema()
            .relations
            .iter()
            .any(|relation| roots.iter().any(|root| self.schema().relation(root) == Some(relation)));

        if touches_relation && self.config.lookup_on_update {
            self.resolver()
                .resolve(&mut patch, ResolveOptions::prune(), Some(roots.as_slice()), &ctx.cancel)
                .await
                .in_operation(location)?;
        }

        let changes = DeltaApplier::new(self.schema()).plan(
            &delta.included_properties,
            &delta.included_paths,
            &patch,
            Some(&existing),
        );

        self.commit(ctx, id, &existing, changes, location).await
    }

    /// Applies the included properties of the template to every accessible listed entity.
    ///
    /// Returns the number of entities matched.
    pub async fn bulk_update(&self, ctx: &OperationContext, bulk: BulkUpdate<E>) -> OperationResult<u64> {
        let location = self.at("bulk_update");
        let span = info_span!("bulk_update", collection = self.name(), requested = bulk.ids.len());

        async { report(&location, self.try_bulk_update(ctx, bulk, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_bulk_update(&self, ctx: &OperationContext, bulk: BulkUpdate<E>, location: &str) -> Result<u64, OperationError> {
        let ids = self
            .access
            .accessible_ids(self.name(), &bulk.ids, &ctx.caller)
            .await
            .in_operation(location)?;

        if ids.is_empty() {
            return Ok(0);
        }

        let mut template = bulk.template;
        template.normalize();
        let mut patch = template.to_document().in_operation(location)?;

        let roots = bulk
            .included_properties
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();
        let touches_relation = roots.iter().any(|root| self.schema().relation(root).is_some());

        if touches_relation && self.config.lookup_on_update {
            self.resolver()
                .resolve(&mut patch, ResolveOptions::prune(), Some(roots.as_slice()), &ctx.cancel)
                .await
                .in_operation(location)?;
        }

        let changes = DeltaApplier::new(self.schema()).plan(&bulk.included_properties, &[], &patch, None);

        if changes.is_empty() {
            debug!(collection = self.name(), "bulk update names no writable properties");
            return Ok(0);
        }

        if let Some(field) = self.schema().unique_name {
            if changes.contains(field) && ids.len() > 1 {
                return Err(OperationError::InvalidArgument(format!(
                    "'{field}' must be unique and cannot be assigned to {} entities",
                    ids.len()
                )));
            }
        }

        let mut update = self.field_update(ctx, changes);

        if let Some(field) = self.schema().version_field() {
            update = update.inc(field, 1);
        }

        let filter = self.visible(ctx, Filter::any_of("id", ids_to_bson(&ids)));

        ctx.cancel.check().in_operation(location)?;
        self.backend
            .update_many(filter, update, self.name())
            .await
            .in_operation(location)
    }

    /// Deletes every accessible listed entity and returns the number deleted.
    pub async fn bulk_delete(&self, ctx: &OperationContext, ids: Vec<Uuid>) -> OperationResult<u64> {
        let location = self.at("bulk_delete");
        let span = info_span!("bulk_delete", collection = self.name(), requested = ids.len());

        async { report(&location, self.try_bulk_delete(ctx, ids, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_bulk_delete(&self, ctx: &OperationContext, ids: Vec<Uuid>, location: &str) -> Result<u64, OperationError> {
        let ids = self
            .access
            .accessible_ids(self.name(), &ids, &ctx.caller)
            .await
            .in_operation(location)?;

        if ids.is_empty() {
            return Ok(0);
        }

        let filter = self.visible(ctx, Filter::any_of("id", ids_to_bson(&ids)));

        ctx.cancel.check().in_operation(location)?;
        self.backend
            .delete_many(filter, self.name())
            .await
            .in_operation(location)
    }

    /// Deletes one entity. Fails with `ObjectNotFound` when it does not exist or is not accessible.
    pub async fn delete(&self, ctx: &OperationContext, id: Uuid) -> OperationResult<()> {
        let location = self.at("delete");
        let span = info_span!("delete", collection = self.name(), %id);

        async { report(&location, self.try_delete(ctx, id, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_delete(&self, ctx: &OperationContext, id: Uuid, location: &str) -> Result<(), OperationError> {
        self.load(ctx, id, location).await?;

        ctx.cancel.check().in_operation(location)?;
        let deleted = self
            .backend
            .delete_one(Filter::eq("id", id), self.name())
            .await
            .in_operation(location)?;

        if deleted == 0 {
            return Err(OperationError::not_found(self.name(), id));
        }

        Ok(())
    }

    /// Runs a search and returns one page of results.
    pub async fn search(&self, ctx: &OperationContext, params: SearchParameters) -> OperationResult<SearchResults<E>> {
        let location = self.at("search");
        let span = info_span!(
            "search",
            collection = self.name(),
            page = params.page,
            page_size = params.page_size
        );

        async { report(&location, self.try_search(ctx, params, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_search(
        &self,
        ctx: &OperationContext,
        params: SearchParameters,
        location: &str,
    ) -> Result<SearchResults<E>, OperationError> {
        let filter = PredicateCompiler::new(self.schema())
            .compile(&params)
            .in_operation(location)?;
        let filter = Expr::all(
            filter
                .into_iter()
                .chain(self.access.visibility_filter(self.name(), &ctx.caller)),
        );

        let plan = SortPlan::resolve(self.schema(), params.sort_by.as_deref(), params.sort_ascending)
            .in_operation(location)?;
        let window = PageWindow::new(params.page, params.page_size);

        let narrowed = !self.access.visibility_filter_is_complete(self.name(), &ctx.caller);

        let (item_count, mut documents) = if plan.is_native() && !narrowed {
            let item_count = ctx
                .cancel
                .guard(self.backend.count(filter.clone(), self.name()))
                .await
                .in_operation(location)?;

            let query = Query {
                filter,
                limit: window.limit(),
                offset: Some(window.offset()).filter(|offset| *offset > 0),
                sort: plan.native_sorts(),
            };
            let documents = ctx
                .cancel
                .guard(self.backend.find(query, self.name()))
                .await
                .in_operation(location)?;

            (item_count, documents)
        } else {
            let query = Query {
                filter,
                sort: plan.native_sorts(),
                ..Query::default()
            };
            let mut documents = ctx
                .cancel
                .guard(self.backend.find(query, self.name()))
                .await
                .in_operation(location)?;

            if narrowed {
                documents = self.accessible_documents(ctx, documents, location).await?;
            }

            let ordered = if plan.is_native() {
                documents
            } else {
                self.order_by_references(documents, &plan, &ctx.cancel)
                    .await
                    .in_operation(location)?
            };

            (ordered.len() as u64, window.slice(ordered))
        };

        if params.include_dependent_elements {
            self.viewing_resolver(ctx)
                .hydrate_all(&mut documents, &ctx.cancel)
                .await
                .in_operation(location)?;
        }

        let results = documents
            .into_iter()
            .map(E::from_document)
            .collect::<DocumentStoreResult<Vec<_>>>()
            .in_operation(location)?;
        let more = window.has_more(item_count, results.len());

        debug!(collection = self.name(), item_count, returned = results.len(), more, "search completed");

        Ok(SearchResults::builder(results)
            .with_item_count(item_count)
            .with_page(window.page as i64, params.page_size)
            .with_more(more)
            .build())
    }

    /// Adds `target` to the id-list of the `relation` (by id field or navigation name).
    ///
    /// Returns whether the list changed; associating twice is a successful no-op.
    pub async fn associate(&self, ctx: &OperationContext, id: Uuid, relation: &str, target: Uuid) -> OperationResult<bool> {
        let location = self.at("associate");
        let span = info_span!("associate", collection = self.name(), %id, relation, %target);

        async { report(&location, self.try_associate(ctx, id, relation, target, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_associate(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        relation: &str,
        target: Uuid,
        location: &str,
    ) -> Result<bool, OperationError> {
        let relation = self.relation(relation, Cardinality::Many)?;
        let existing = self.load(ctx, id, location).await?;
        let mut ids = bson_to_ids(existing.get(relation.id_field).unwrap_or(&Bson::Null));

        if ids.contains(&target) {
            return Ok(false);
        }

        if !self
            .resolver()
            .exists(relation.target, target, &ctx.cancel)
            .await
            .in_operation(location)?
        {
            return Err(OperationError::not_found(relation.target, target));
        }

        ids.push(target);
        self.write_relation(ctx, id, &existing, relation, ids_to_bson(&ids), location)
            .await
    }

    /// Removes `target` from the id-list of the `relation`.
    ///
    /// Returns whether the list changed; removing an absent id is a successful no-op.
    pub async fn dissociate(&self, ctx: &OperationContext, id: Uuid, relation: &str, target: Uuid) -> OperationResult<bool> {
        let location = self.at("dissociate");
        let span = info_span!("dissociate", collection = self.name(), %id, relation, %target);

        async { report(&location, self.try_dissociate(ctx, id, relation, target, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_dissociate(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        relation: &str,
        target: Uuid,
        location: &str,
    ) -> Result<bool, OperationError> {
        let relation = self.relation(relation, Cardinality::Many)?;
        let existing = self.load(ctx, id, location).await?;
        let mut ids = bson_to_ids(existing.get(relation.id_field).unwrap_or(&Bson::Null));

        if !ids.contains(&target) {
            return Ok(false);
        }

        ids.retain(|current| *current != target);
        self.write_relation(ctx, id, &existing, relation, ids_to_bson(&ids), location)
            .await
    }

    /// Points a single-reference `relation` at `target`, or clears it with `None`.
    ///
    /// Returns whether the reference changed.
    pub async fn set_reference(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        relation: &str,
        target: Option<Uuid>,
    ) -> OperationResult<bool> {
        let location = self.at("set_reference");
        let span = info_span!("set_reference", collection = self.name(), %id, relation);

        async { report(&location, self.try_set_reference(ctx, id, relation, target, &location).await) }
            .instrument(span)
            .await
    }

    async fn try_set_reference(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        relation: &str,
        target: Option<Uuid>,
        location: &str,
    ) -> Result<bool, OperationError> {
        let relation = self.relation(relation, Cardinality::One)?;
        let existing = self.load(ctx, id, location).await?;
        let current = existing.get(relation.id_field).and_then(bson_to_id);

        if current == target {
            return Ok(false);
        }

        let value = match target {
            Some(target) => {
                if !self
                    .resolver()
                    .exists(relation.target, target, &ctx.cancel)
                    .await
                    .in_operation(location)?
                {
                    return Err(OperationError::not_found(relation.target, target));
                }
                Bson::from(target)
            }
            None => Bson::Null,
        };

        self.write_relation(ctx, id, &existing, relation, value, location)
            .await
    }

    fn relation(&self, name: &str, cardinality: Cardinality) -> Result<&'static Relation, OperationError> {
        self.schema()
            .relation(name)
            .filter(|relation| relation.cardinality == cardinality)
            .ok_or_else(|| {
                OperationError::InvalidArgument(format!(
                    "{} has no {cardinality:?} relation named '{name}'",
                    self.name()
                ))
            })
    }

    async fn write_relation(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        existing: &Document,
        relation: &Relation,
        value: Bson,
        location: &str,
    ) -> Result<bool, OperationError> {
        let mut changes = ChangeSet::new();
        changes.insert(relation.id_field, value);

        self.write_changes(ctx, id, self.version_of(existing), changes, true, location)
            .await?;

        Ok(true)
    }

    /// Loads a stored document visible to the caller.
    async fn load(&self, ctx: &OperationContext, id: Uuid, location: &str) -> Result<Document, OperationError> {
        let query = Query {
            filter: Some(self.visible(ctx, Filter::eq("id", id))),
            limit: Some(1),
            ..Query::default()
        };

        let document = ctx
            .cancel
            .guard(self.backend.find(query, self.name()))
            .await
            .in_operation(location)?
            .into_iter()
            .next()
            .ok_or_else(|| OperationError::not_found(self.name(), id))?;

        if !self
            .access
            .is_accessible(self.name(), &id, &ctx.caller)
            .await
            .in_operation(location)?
        {
            return Err(OperationError::not_found(self.name(), id));
        }

        Ok(document)
    }

    /// Keeps the documents the caller may access, in their current order.
    async fn accessible_documents(
        &self,
        ctx: &OperationContext,
        documents: Vec<Document>,
        location: &str,
    ) -> Result<Vec<Document>, OperationError> {
        let ids = documents
            .iter()
            .filter_map(|document| document.get("id").and_then(bson_to_id))
            .collect::<Vec<_>>();
        let accessible = ctx
            .cancel
            .guard(self.access.accessible_ids(self.name(), &ids, &ctx.caller))
            .await
            .in_operation(location)?
            .into_iter()
            .collect::<HashSet<_>>();

        Ok(documents
            .into_iter()
            .filter(|document| {
                document
                    .get("id")
                    .and_then(bson_to_id)
                    .is_some_and(|id| accessible.contains(&id))
            })
            .collect())
    }

    async fn exists(&self, id: Uuid, cancel: &CancelToken) -> DocumentStoreResult<bool> {
        self.resolver().exists(self.name(), id, cancel).await
    }

    /// Writes a non-empty change set, stamped and version-checked.
    async fn commit(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        existing: &Document,
        changes: ChangeSet,
        location: &str,
    ) -> Result<ChangeSummary, OperationError> {
        if changes.is_empty() {
            debug!(collection = self.name(), %id, "no changes to write");
            return Ok(ChangeSummary::unchanged(id));
        }

        if self.config.validate_unique_names {
            if let Some(field) = self.schema().unique_name {
                if changes.contains(field) {
                    let mut renamed = Document::new();
                    renamed.insert(field, changes.get(field).cloned().unwrap_or(Bson::Null));
                    self.check_unique_name(&renamed, id, &ctx.cancel, location)
                        .await?;
                }
            }
        }

        let changed_fields = changes.fields();
        self.write_changes(ctx, id, self.version_of(existing), changes, true, location)
            .await?;

        Ok(ChangeSummary { id, changed_fields })
    }

    async fn write_changes(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        expected_version: Option<i64>,
        changes: ChangeSet,
        stamp: bool,
        location: &str,
    ) -> Result<(), OperationError> {
        let mut update = if stamp {
            self.field_update(ctx, changes)
        } else {
            changes
                .into_inner()
                .into_iter()
                .fold(FieldUpdate::new(), |update, (field, value)| update.set(field, value))
        };
        let mut filter = Filter::eq("id", id);
        let mut versioned = false;

        if let Some(field) = self.schema().version_field() {
            update = update.inc(field, 1);

            if let Some(version) = expected_version {
                filter = Filter::and(vec![filter, Filter::eq(field, version)]);
                versioned = true;
            }
        }

        ctx.cancel.check().in_operation(location)?;
        let matched = self
            .backend
            .update_one(filter, update, self.name())
            .await
            .in_operation(location)?;

        match (matched, versioned) {
            (0, true) => Err(OperationError::ConcurrentModification(id.to_string())),
            (0, false) => Err(OperationError::not_found(self.name(), id)),
            _ => Ok(()),
        }
    }

    /// The change set as a field update, with the engine's stamps appended.
    fn field_update(&self, ctx: &OperationContext, changes: ChangeSet) -> FieldUpdate {
        changes
            .into_inner()
            .into_iter()
            .chain(self.stamps(ctx))
            .fold(FieldUpdate::new(), |update, (field, value)| update.set(field, value))
    }

    fn stamps(&self, ctx: &OperationContext) -> Vec<(String, Bson)> {
        let now = bson::DateTime::now();

        self.schema()
            .fields
            .iter()
            .filter_map(|field| match field.role {
                FieldRole::UpdatedAt => Some((field.name.to_string(), Bson::DateTime(now))),
                FieldRole::UpdatedBy => Some((field.name.to_string(), Bson::String(ctx.stamp()))),
                _ => None,
            })
            .collect()
    }

    fn version_of(&self, document: &Document) -> Option<i64> {
        let field = self.schema().version_field()?;

        document
            .get(field)
            .and_then(as_number)
            .map(|version| version as i64)
    }

    fn visible(&self, ctx: &OperationContext, filter: Expr) -> Expr {
        match self.access.visibility_filter(self.name(), &ctx.caller) {
            Some(visibility) => Filter::and(vec![filter, visibility]),
            None => filter,
        }
    }

    fn strip_navigation(&self, document: &mut Document) {
        for field in self.schema().fields_with_role(FieldRole::Navigation) {
            document.remove(field.name);
        }
    }

    async fn check_unique_name(
        &self,
        document: &Document,
        id: Uuid,
        cancel: &CancelToken,
        location: &str,
    ) -> Result<(), OperationError> {
        let Some(field) = self.schema().unique_name else {
            return Ok(());
        };
        let Some(name) = document.get_str(field).ok().map(str::trim).filter(|name| !name.is_empty()) else {
            return Ok(());
        };

        let filter = Filter::and(vec![Filter::eq_ignore_case(field, name), Filter::ne("id", id)]);
        let taken = cancel
            .guard(self.backend.count(Some(filter), self.name()))
            .await
            .in_operation(location)?;

        if taken > 0 {
            return Err(OperationError::DuplicateName(name.to_string()));
        }

        Ok(())
    }

    /// Orders documents by a plan that sorts on fields of referenced entities.
    ///
    /// Referenced values are fetched with one query per reference key. Documents
    /// without a resolvable reference sort as null, i.e. first when ascending.
    async fn order_by_references(
        &self,
        documents: Vec<Document>,
        plan: &SortPlan,
        cancel: &CancelToken,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut lookups = Vec::with_capacity(plan.terms.len());

        for term in &plan.terms {
            let SortKey::Reference { id_field, target, target_field } = term.key else {
                lookups.push(HashMap::new());
                continue;
            };

            let mut ids = Vec::new();
            for id in documents.iter().filter_map(|document| document.get(id_field).and_then(bson_to_id)) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }

            if ids.is_empty() {
                lookups.push(HashMap::new());
                continue;
            }

            let referenced = cancel
                .guard(self.backend.find(Query::filtered(Some(Filter::any_of("id", ids_to_bson(&ids)))), target))
                .await?;

            lookups.push(
                referenced
                    .iter()
                    .filter_map(|document| {
                        let id = document.get("id").and_then(bson_to_id)?;
                        let value = lookup_path(document, target_field).cloned().unwrap_or(Bson::Null);
                        Some((id, value))
                    })
                    .collect::<HashMap<_, _>>(),
            );
        }

        let mut keyed = documents
            .into_iter()
            .map(|document| {
                let keys = plan
                    .terms
                    .iter()
                    .zip(&lookups)
                    .map(|(term, values)| match &term.key {
                        SortKey::Field(field) => lookup_path(&document, field).cloned().unwrap_or(Bson::Null),
                        SortKey::Reference { id_field, .. } => document
                            .get(*id_field)
                            .and_then(bson_to_id)
                            .and_then(|id| values.get(&id).cloned())
                            .unwrap_or(Bson::Null),
                    })
                    .collect::<Vec<_>>();
                (keys, document)
            })
            .collect::<Vec<_>>();

        keyed.sort_by(|(left, _), (right, _)| {
            left.iter()
                .zip(right)
                .zip(&plan.terms)
                .map(|((a, b), term)| match term.direction {
                    SortDirection::Asc => compare_values(a, b),
                    SortDirection::Desc => compare_values(a, b).reverse(),
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        Ok(keyed.into_iter().map(|(_, document)| document).collect())
    }
}

/// Logs a failed operation and wraps the outcome.
fn report<T>(location: &str, result: Result<T, OperationError>) -> OperationResult<T> {
    match &result {
        Err(err @ OperationError::GenericWriteFailure { detail, .. }) => {
            error!(location = %location, detail = %detail, "{err}");
        }
        Err(err) => debug!(location = %location, kind = ?err.kind(), "{err}"),
        Ok(_) => {}
    }

    result.into()
}
