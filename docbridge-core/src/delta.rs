//! Explicit-path partial updates.
//!
//! A [`Delta`] names the properties a caller changed and carries an entity holding their
//! new values. [`DeltaApplier`] reduces it to the minimal set of field paths to write:
//!
//! - a path into a list or map replaces the whole list or map, once per root,
//! - a dotted path into an embedded object sets `root.leaf` only, unless the stored object
//!   is null or missing, in which case the whole object is written,
//! - fields derived from a changed field are written along with it.
//!
//! Paths naming the id, an unknown field or an engine-owned field are skipped.

use std::collections::HashSet;

use bson::{Bson, Document, Uuid};
use tracing::warn;

use crate::{
    diff::ChangeSet,
    schema::{EntitySchema, FieldDescriptor},
};

/// A partial update of one entity.
///
/// # Example
///
/// ```ignore
/// let delta = Delta::new(category.id, PhoneBookCategory::new("Renamed"))
///     .property("name");
///
/// categories.update_delta(&ctx, delta).await;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Delta<E> {
    pub id: Uuid,
    /// Top-level properties that changed.
    pub included_properties: Vec<String>,
    /// Dotted sub-paths that changed, e.g. `settings.priority`.
    pub included_paths: Vec<String>,
    /// Carries the new values; other fields are ignored.
    pub data: E,
}

impl<E> Delta<E> {
    pub fn new(id: Uuid, data: E) -> Self {
        Self {
            id,
            included_properties: Vec::new(),
            included_paths: Vec::new(),
            data,
        }
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.included_properties.push(name.into());
        self
    }

    /// Adds a dotted path; its root is added to the included properties as well.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        let root = path.split('.').next().unwrap_or_default().to_string();

        if !self.included_properties.contains(&root) {
            self.included_properties.push(root);
        }
        self.included_paths.push(path);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.included_properties.is_empty() && self.included_paths.is_empty()
    }

    /// Top-level roots touched by this delta.
    pub fn roots(&self) -> Vec<&str> {
        let mut roots = Vec::new();

        for path in self.included_properties.iter().chain(&self.included_paths) {
            let root = path.split('.').next().unwrap_or_default();

            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        roots
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeltaApplier {
    schema: &'static EntitySchema,
}

impl DeltaApplier {
    pub fn new(schema: &'static EntitySchema) -> Self {
        Self { schema }
    }

    /// Computes the field paths to write and their values from `patch`.
    ///
    /// `existing` is the stored document, when known; leaves are only set inside objects it holds.
    pub fn plan(
        &self,
        properties: &[String],
        paths: &[String],
        patch: &Document,
        existing: Option<&Document>,
    ) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let mut replaced_roots = HashSet::new();

        let path_roots = paths
            .iter()
            .filter_map(|path| self.schema.field(path.trim().split('.').next().unwrap_or_default()))
            .map(|field| field.name)
            .collect::<HashSet<_>>();
        let uncovered = properties.iter().filter(|property| {
            self.schema
                .field(property.trim())
                .is_none_or(|field| !path_roots.contains(field.name))
        });

        for path in paths.iter().chain(uncovered) {
            let mut segments = path.trim().splitn(2, '.');
            let root_name = segments.next().unwrap_or_default();
            let rest = segments.next();

            let Some(root) = self.writable_field(root_name, path) else {
                continue;
            };

            let stored_parent = existing.is_none_or(|existing| existing.get_document(root.name).is_ok());

            match rest {
                Some(_) if replaced_roots.contains(root.name) => {}
                Some(rest) if !root.kind.is_collection() && stored_parent => {
                    let leaf_name = rest.split('.').next().unwrap_or_default();
                    let leaf = root
                        .child(leaf_name)
                        .map(|child| child.name.to_string())
                        .unwrap_or_else(|| leaf_name.to_string());
                    let value = patch
                        .get_document(root.name)
                        .ok()
                        .and_then(|inner| inner.get(&leaf))
                        .cloned()
                        .unwrap_or(Bson::Null);

                    changes.insert(format!("{}.{}", root.name, leaf), value);
                }
                _ => {
                    if replaced_roots.insert(root.name) {
                        changes.insert(root.name, patch.get(root.name).cloned().unwrap_or(Bson::Null));
                    }
                }
            }
        }

        let changed_roots = changes
            .fields()
            .into_iter()
            .filter_map(|field| field.split('.').next().map(str::to_string))
            .collect::<Vec<_>>();

        for root in changed_roots {
            for derived in self.schema.derived_from(&root) {
                changes.insert(derived.name, patch.get(derived.name).cloned().unwrap_or(Bson::Null));
            }
        }

        changes
    }

    fn writable_field(&self, name: &str, path: &str) -> Option<&'static FieldDescriptor> {
        match self.schema.field(name) {
            Some(field) if field.is_internal() => {
                warn!(path = %path, collection = self.schema.collection, "skipping engine-owned field in delta");
                None
            }
            Some(field) => Some(field),
            None => {
                warn!(path = %path, collection = self.schema.collection, "skipping unknown field in delta");
                None
            }
        }
    }
}
