//! In-memory storage implementation for document stores.
//!
//! This module provides a simple in-memory backend that stores documents as BSON
//! documents in HashMaps guarded by async-safe read-write locks.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, Uuid};
use mea::rwlock::RwLock;
use tracing::trace;

use docbridge_core::{
    backend::{FieldUpdate, StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query},
    sort::{as_number, compare_documents},
};

use crate::evaluator::DocumentEvaluator;

type CollectionMap = HashMap<Uuid, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data. Every write holds the write lock for the whole
/// filter-and-update step, so single-document writes are atomic.
///
/// # Performance
///
/// Queries scan all documents in a collection (no indexing). For larger datasets,
/// consider using a persistent backend like MongoDB.
///
/// # Example
///
/// ```ignore
/// use docbridge_memory::InMemoryStore;
/// use docbridge::backend::StoreBackend;
/// use docbridge::query::{Filter, Query};
/// use bson::{Uuid, doc};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = Uuid::new();
///     store.insert_one(id, doc! { "id": id, "name": "Alice" }, "users").await?;
///
///     let found = store.find(Query::filtered(Some(Filter::eq("name", "Alice"))), "users").await?;
///     assert_eq!(found.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, HashMap::len)
    }

    fn matching_ids(collection: &CollectionMap, filter: &Expr) -> DocumentStoreResult<Vec<Uuid>> {
        let mut ids = Vec::new();

        for (id, document) in collection {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                ids.push(*id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}

/// Applies a field update in place. Dotted paths create missing embedded documents.
fn apply_update(document: &mut Document, update: &FieldUpdate) -> DocumentStoreResult<()> {
    for (path, value) in &update.set {
        set_path(document, path, value.clone())?;
    }

    for (path, by) in &update.inc {
        let current = get_path(document, path)
            .and_then(as_number)
            .unwrap_or(0.0) as i64;
        set_path(document, path, Bson::Int64(current + by))?;
    }

    Ok(())
}

fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }

            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(DocumentStoreError::Write(format!("cannot set '{path}'"))),
            }
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = match &query.filter {
            Some(filter) => DocumentEvaluator::filter_documents(collection_map.values(), filter)?,
            None => collection_map.values().cloned().collect::<Vec<_>>(),
        };

        documents.sort_by(|a, b| compare_documents(a, b, &query.sort));

        trace!(collection, matched = documents.len(), "evaluated query");

        Ok(documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(0);
        };

        let count = match &filter {
            Some(filter) => Self::matching_ids(collection_map, filter)?.len(),
            None => collection_map.len(),
        };

        Ok(count as u64)
    }

    async fn insert_one(&self, id: Uuid, document: Document, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        if collection_map.contains_key(&id) {
            return Err(DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
        }

        collection_map.insert(id, document);

        Ok(())
    }

    async fn update_one(&self, filter: Expr, update: FieldUpdate, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return Ok(0);
        };

        let Some(id) = Self::matching_ids(collection_map, &filter)?.into_iter().next() else {
            return Ok(0);
        };

        if let Some(document) = collection_map.get_mut(&id) {
            apply_update(document, &update)?;
        }

        Ok(1)
    }

    async fn update_many(&self, filter: Expr, update: FieldUpdate, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return Ok(0);
        };

        let ids = Self::matching_ids(collection_map, &filter)?;

        for id in &ids {
            if let Some(document) = collection_map.get_mut(id) {
                apply_update(document, &update)?;
            }
        }

        Ok(ids.len() as u64)
    }

    async fn delete_one(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return Ok(0);
        };

        let Some(id) = Self::matching_ids(collection_map, &filter)?.into_iter().next() else {
            return Ok(0);
        };

        Ok(collection_map.remove(&id).map_or(0, |_| 1))
    }

    async fn delete_many(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return Ok(0);
        };

        let ids = Self::matching_ids(collection_map, &filter)?;

        Ok(ids
            .iter()
            .filter(|id| collection_map.remove(*id).is_some())
            .count() as u64)
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store.write().await.remove(name);

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use docbridge_memory::InMemoryStore;
/// use docbridge::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use docbridge_core::query::{Filter, SortDirection};

    use super::*;

    async fn seeded() -> (InMemoryStore, Vec<Uuid>) {
        let store = InMemoryStore::new();
        let mut ids = Vec::new();

        for (name, priority) in [("Charlie", 2), ("alpha", 1), ("Bravo", 3)] {
            let id = Uuid::new();
            store
                .insert_one(id, doc! { "id": id, "name": name, "settings": { "priority": priority }, "version": 0_i64 }, "things")
                .await
                .unwrap();
            ids.push(id);
        }

        (store, ids)
    }

    #[tokio::test]
    async fn find_sorts_and_pages() {
        let (store, _) = seeded().await;

        let query = Query::builder()
            .sort("settings.priority", SortDirection::Desc)
            .offset(1)
            .limit(1)
            .build();
        let found = store.find(query, "things").await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("name").unwrap(), "Charlie");
        assert!(store.find(Query::new(), "missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let (store, ids) = seeded().await;

        let err = store
            .insert_one(ids[0], doc! { "id": ids[0] }, "things")
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(..)));
    }

    #[tokio::test]
    async fn updates_set_nested_paths_and_increment() {
        let (store, ids) = seeded().await;
        let update = FieldUpdate::new()
            .set("settings.priority", 9)
            .set("settings.color", "red")
            .inc("version", 1);

        let matched = store
            .update_one(Filter::and(vec![Filter::eq("id", ids[0]), Filter::eq("version", 0)]), update.clone(), "things")
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let stale = store
            .update_one(Filter::and(vec![Filter::eq("id", ids[0]), Filter::eq("version", 0)]), update, "things")
            .await
            .unwrap();
        assert_eq!(stale, 0);

        let found = store
            .find(Query::filtered(Some(Filter::eq("id", ids[0]))), "things")
            .await
            .unwrap();
        assert_eq!(found[0].get_document("settings").unwrap(), &doc! { "priority": 9, "color": "red" });
        assert_eq!(found[0].get_i64("version").unwrap(), 1);
    }

    #[tokio::test]
    async fn many_writes_report_counts() {
        let (store, ids) = seeded().await;

        let matched = store
            .update_many(Filter::any_of("id", vec![ids[0], ids[1]]), FieldUpdate::new().set("flag", true), "things")
            .await
            .unwrap();
        assert_eq!(matched, 2);
        assert_eq!(store.count(Some(Filter::eq("flag", true)), "things").await.unwrap(), 2);

        let deleted = store
            .delete_many(Filter::any_of("id", vec![ids[1], ids[2], Uuid::new()]), "things")
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.len("things").await, 1);
        assert_eq!(store.delete_one(Filter::eq("id", ids[2]), "things").await.unwrap(), 0);
    }
}
