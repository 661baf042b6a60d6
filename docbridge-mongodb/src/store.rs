use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions},
};
use tracing::trace;

use docbridge_core::{
    backend::{FieldUpdate, StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
};

use crate::{query::MongoQueryTranslator, sanitizer::ValueSanitizer};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_key(collection_name))
    }

    /// Escapes keys and keys the stored document by the entity id.
    fn prepare_document(id: Uuid, document: &Document) -> Document {
        let mut prepared = ValueSanitizer::sanitize_document(document);
        prepared.insert("_id", Bson::from(id));
        prepared
    }

    fn restore_document(document: Document) -> Document {
        let mut restored = ValueSanitizer::restore_document(&document);
        restored.remove("_id");
        restored
    }

    fn sort_document(query: &Query) -> Option<Document> {
        if query.sort.is_empty() {
            return None;
        }

        Some(
            query
                .sort
                .iter()
                .map(|sort| {
                    let direction = match sort.direction {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    };
                    (ValueSanitizer::sanitize_path(&sort.field), Bson::Int32(direction))
                })
                .collect(),
        )
    }

    fn update_document(update: &FieldUpdate) -> Document {
        let mut modifications = Document::new();

        if !update.set.is_empty() {
            let set = update
                .set
                .iter()
                .map(|(path, value)| (ValueSanitizer::sanitize_path(path), ValueSanitizer::sanitize_value(value)))
                .collect::<Document>();
            modifications.insert("$set", set);
        }

        if !update.inc.is_empty() {
            let inc = update
                .inc
                .iter()
                .map(|(path, by)| (ValueSanitizer::sanitize_path(path), Bson::Int64(*by)))
                .collect::<Document>();
            modifications.insert("$inc", inc);
        }

        modifications
    }

    fn write_error(error: MongoError) -> DocumentStoreError {
        match &*error.kind {
            ErrorKind::Write(WriteFailure::WriteError(failure)) => DocumentStoreError::Write(failure.message.clone()),
            _ => DocumentStoreError::Backend(error.to_string()),
        }
    }

    async fn close(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let filter = MongoQueryTranslator::translate(query.filter.as_ref())?;
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        options.sort = Self::sort_document(&query);

        trace!(collection, %filter, "translated query");

        Ok(
            self.get_collection(collection)
                .find(filter)
                .with_options(options)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .into_iter()
                .map(Self::restore_document)
                .collect()
        )
    }

    async fn count(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::translate(filter.as_ref())?)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn insert_one(&self, id: Uuid, document: Document, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .insert_one(Self::prepare_document(id, &document))
            .await
            .map_err(|e| match &*e.kind {
                ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY => {
                    DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string())
                }
                _ => Self::write_error(e),
            })?;

        Ok(())
    }

    async fn update_one(&self, filter: Expr, update: FieldUpdate, collection: &str) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .update_one(MongoQueryTranslator::translate(Some(&filter))?, Self::update_document(&update))
                .await
                .map_err(Self::write_error)?
                .matched_count
        )
    }

    async fn update_many(&self, filter: Expr, update: FieldUpdate, collection: &str) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .update_many(MongoQueryTranslator::translate(Some(&filter))?, Self::update_document(&update))
                .await
                .map_err(Self::write_error)?
                .matched_count
        )
    }

    async fn delete_one(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_one(MongoQueryTranslator::translate(Some(&filter))?)
                .await
                .map_err(Self::write_error)?
                .deleted_count
        )
    }

    async fn delete_many(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(MongoQueryTranslator::translate(Some(&filter))?)
                .await
                .map_err(Self::write_error)?
                .deleted_count
        )
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let sanitized = ValueSanitizer::sanitize_key(name);
        let database = self.client.database(&self.database);

        let existing = database
            .list_collection_names()
            .filter(doc! { "name": sanitized.as_str() })
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        if existing.is_empty() {
            database
                .create_collection(&sanitized)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;
        }

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
            .into_iter()
            .map(|name| ValueSanitizer::restore_key(&name))
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.close().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_are_keyed_by_id_and_restored_without_it() {
        let id = Uuid::new();
        let prepared = MongoDbStore::prepare_document(id, &doc! { "id": id, "attributes": { "a.b": 1 } });

        assert_eq!(prepared.get("_id"), Some(&Bson::from(id)));
        assert!(prepared.get_document("attributes").unwrap().contains_key("a__dot__b"));

        let restored = MongoDbStore::restore_document(prepared);
        assert_eq!(restored, doc! { "id": id, "attributes": { "a.b": 1 } });
    }

    #[test]
    fn updates_only_carry_used_operators() {
        let update = FieldUpdate::new().set("settings.priority", 3);
        assert_eq!(MongoDbStore::update_document(&update), doc! { "$set": { "settings.priority": 3 } });

        let update = update.inc("version", 1);
        assert_eq!(
            MongoDbStore::update_document(&update),
            doc! { "$set": { "settings.priority": 3 }, "$inc": { "version": 1_i64 } },
        );
    }

    #[test]
    fn sorts_keep_key_order() {
        let query = Query::builder()
            .sort("last_name", SortDirection::Asc)
            .sort("first_name", SortDirection::Desc)
            .build();

        assert_eq!(
            MongoDbStore::sort_document(&query),
            Some(doc! { "last_name": 1, "first_name": -1 }),
        );
        assert_eq!(MongoDbStore::sort_document(&Query::new()), None);
    }
}
