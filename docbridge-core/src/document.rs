//! Core traits for entities managed by the engine.
//!
//! This module provides the trait every stored entity implements, as well as utilities for
//! converting entities to and from BSON documents and JSON.

use bson::{Bson, Document, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};
use std::fmt::Debug;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    schema::EntitySchema,
};

/// The all-zero id, meaning "not assigned yet".
pub const UNASSIGNED_ID: Uuid = Uuid::from_bytes([0; 16]);

/// Core trait that all entities stored through the engine must implement.
///
/// Navigation fields (hydrated copies of referenced entities) must be declared
/// `#[serde(default, skip_serializing)]` so they are read back on hydration but never
/// persisted.
///
/// # Example
///
/// ```ignore
/// use docbridge::document::Entity;
/// use docbridge::schema::*;
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// static TEAM_FIELDS: &[FieldDescriptor] = &[
///     FieldDescriptor::id(),
///     FieldDescriptor::data("name", FieldKind::String),
/// ];
///
/// static TEAM_SCHEMA: EntitySchema = EntitySchema::new("teams", TEAM_FIELDS)
///     .with_default_sort(&["name"])
///     .with_name_search(NameSearch::Field("name"))
///     .with_unique_name("name");
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Team {
///     pub id: Uuid,
///     pub name: String,
/// }
///
/// impl Entity for Team {
///     fn id(&self) -> &Uuid { &self.id }
///     fn set_id(&mut self, id: Uuid) { self.id = id; }
///     fn schema() -> &'static EntitySchema { &TEAM_SCHEMA }
///     fn display_name(&self) -> Option<&str> { Some(&self.name) }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Clone + Debug + 'static {
    /// Returns a reference to this entity's unique identifier.
    fn id(&self) -> &Uuid;

    /// Assigns the identifier. Only called by the engine for new entities.
    fn set_id(&mut self, id: Uuid);

    /// The static field table of this entity type.
    fn schema() -> &'static EntitySchema;

    /// Returns the name of the collection this entity belongs to.
    fn collection_name() -> &'static str {
        Self::schema().collection
    }

    fn display_name(&self) -> Option<&str> {
        None
    }

    /// Brings the entity into its canonical form before it is written: recompute derived
    /// fields, assign ids to embedded elements.
    fn normalize(&mut self) {}

    /// Whether the id still has to be assigned.
    fn has_unassigned_id(&self) -> bool {
        *self.id() == UNASSIGNED_ID
    }
}

/// Extension trait providing serialization utilities for entities.
///
/// This trait is automatically implemented for all types that implement [`Entity`].
pub trait EntityExt: Entity {
    /// Converts this entity to a BSON document for storage.
    fn to_document(&self) -> DocumentStoreResult<Document>;

    /// Reads an entity back from a stored (and possibly hydrated) document.
    fn from_document(document: Document) -> DocumentStoreResult<Self>;

    /// Converts this entity to a JSON value.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates an entity from a JSON value.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<E: Entity> EntityExt for E {
    fn to_document(&self) -> DocumentStoreResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "{} serialized to {:?} instead of a document",
                Self::collection_name(),
                other.element_type()
            ))),
        }
    }

    fn from_document(document: Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }
}

/// Reads a stored id, accepting both binary UUIDs and their string form.
pub fn bson_to_id(value: &Bson) -> Option<Uuid> {
    match value {
        Bson::Binary(binary) => binary.to_uuid().ok(),
        Bson::String(text) => Uuid::parse_str(text).ok(),
        _ => None,
    }
}

/// Reads a stored id list, skipping entries that are not ids.
pub fn bson_to_ids(value: &Bson) -> Vec<Uuid> {
    match value {
        Bson::Array(items) => items.iter().filter_map(bson_to_id).collect(),
        _ => Vec::new(),
    }
}

pub fn ids_to_bson(ids: &[Uuid]) -> Bson {
    Bson::Array(ids.iter().copied().map(Bson::from).collect())
}
