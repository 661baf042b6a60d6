//! Storage backend abstraction for the engine.
//!
//! This module defines the document-store collaborator the engine runs against. A backend
//! only needs to understand the [`Expr`] filter AST, multi-key sorting, and single-level
//! partial updates ([`FieldUpdate`]); all relational behavior lives in the engine.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docbridge::backend::{StoreBackend, FieldUpdate};
//! use docbridge::query::{Filter, Query};
//! use bson::{Uuid, doc};
//!
//! let id = Uuid::new();
//! backend.insert_one(id, doc! { "id": id, "name": "Alice" }, "users").await?;
//!
//! let matched = backend
//!     .update_one(Filter::eq("id", id), FieldUpdate::new().set("name", "Alicia"), "users")
//!     .await?;
//! assert_eq!(matched, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document, Uuid};
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    query::{Expr, Query},
};

/// A partial update: fields to set and counters to increment.
///
/// Paths may be dotted (`settings.priority`) to address a field of an embedded object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, i64)>,
}

impl FieldUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set.push((path.into(), value.into()));
        self
    }

    pub fn inc(mut self, path: impl Into<String>, by: i64) -> Self {
        self.inc.push((path.into(), by));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty()
    }

    /// Paths written by this update.
    pub fn paths(&self) -> Vec<&str> {
        self.set
            .iter()
            .map(|(path, _)| path.as_str())
            .chain(self.inc.iter().map(|(path, _)| path.as_str()))
            .collect()
    }
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks.
///
/// # Atomicity
///
/// Single-document writes (`insert_one`, `update_one`, `delete_one`) must be atomic:
/// the filter is evaluated and the update applied as one step, so a filter on a version
/// field acts as an optimistic concurrency check.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Rejected writes should be reported as
/// [`DocumentStoreError::Write`](crate::error::DocumentStoreError::Write), a duplicate id
/// as [`DocumentStoreError::DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the documents matching the query, ordered by its sort keys, after skipping
    /// `offset` documents and taking at most `limit`.
    ///
    /// A missing collection has no documents.
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>>;

    /// Counts the documents matching the filter.
    async fn count(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64>;

    /// Inserts a new document. The collection is created on first insert.
    async fn insert_one(&self, id: Uuid, document: Document, collection: &str) -> DocumentStoreResult<()>;

    /// Applies the update to the first document matching the filter and returns the matched count (0 or 1).
    async fn update_one(&self, filter: Expr, update: FieldUpdate, collection: &str) -> DocumentStoreResult<u64>;

    /// Applies the update to every matching document and returns the matched count.
    async fn update_many(&self, filter: Expr, update: FieldUpdate, collection: &str) -> DocumentStoreResult<u64>;

    /// Deletes the first document matching the filter and returns the deleted count (0 or 1).
    async fn delete_one(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64>;

    /// Deletes every matching document and returns the deleted count.
    async fn delete_many(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64>;

    /// Creates an empty collection. Creating an existing collection is not an error.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection and all its documents.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with persistent storage or
    /// external connections should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        (*self).find(query, collection).await
    }

    async fn count(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        (*self).count(filter, collection).await
    }

    async fn insert_one(&self, id: Uuid, document: Document, collection: &str) -> DocumentStoreResult<()> {
        (*self)
            .insert_one(id, document, collection)
            .await
    }

    async fn update_one(&self, filter: Expr, update: FieldUpdate, collection: &str) -> DocumentStoreResult<u64> {
        (*self)
            .update_one(filter, update, collection)
            .await
    }

    async fn update_many(&self, filter: Expr, update: FieldUpdate, collection: &str) -> DocumentStoreResult<u64> {
        (*self)
            .update_many(filter, update, collection)
            .await
    }

    async fn delete_one(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        (*self).delete_one(filter, collection).await
    }

    async fn delete_many(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        (*self).delete_many(filter, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (*self).list_collections().await
    }
}

/// Factory trait for creating [`StoreBackend`] instances.
///
/// ```ignore
/// let backend = InMemoryStore::builder().build().await?;
/// ```
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
