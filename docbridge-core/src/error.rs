//! Error types for store access and for caller-facing operations.
//!
//! Two layers of errors exist:
//!
//! - [`DocumentStoreError`] is raised by backends and by the internal planning stages
//!   (predicate compilation, sort resolution, serialization). It never reaches callers directly.
//! - [`OperationError`] is the caller-facing taxonomy carried inside an
//!   [`OperationResult`](crate::result::OperationResult).

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::result::ErrorKind;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The document violates schema constraints or has invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A search descriptor, sort field or filter value could not be compiled.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The store rejected a write.
    #[error("Write error: {0}")]
    Write(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// The caller cancelled the operation or its deadline passed.
    #[error("Operation cancelled")]
    Cancelled,
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

/// Caller-facing failure of an entity operation.
///
/// Messages are safe to show to end users. Store details only travel in
/// [`OperationError::GenericWriteFailure::detail`], which is logged and kept
/// out of the display text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    /// No visible entity with the given id exists.
    #[error("Object {id} not found in {collection}")]
    ObjectNotFound { collection: String, id: String },
    /// An entity with the same id already exists.
    #[error("Object {0} already exists")]
    DuplicateObject(String),
    /// An entity with the same name (compared case-insensitively) already exists.
    #[error("An object named '{0}' already exists")]
    DuplicateName(String),
    /// The store failed; `message` is sanitized, `detail` is for the log.
    #[error("{message}")]
    GenericWriteFailure { message: String, detail: String },
    /// The entity changed between read and write.
    #[error("Object {0} was modified concurrently")]
    ConcurrentModification(String),
    /// A search descriptor could not be compiled.
    #[error("Invalid search: {0}")]
    InvalidSearch(String),
    /// The caller passed an argument that does not fit the entity type.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

impl OperationError {
    pub fn not_found(collection: impl Into<String>, id: impl ToString) -> Self {
        OperationError::ObjectNotFound {
            collection: collection.into(),
            id: id.to_string(),
        }
    }

    /// Converts a store error raised inside `location` into its caller-facing form.
    pub fn from_store(err: DocumentStoreError, location: &str) -> Self {
        match err {
            DocumentStoreError::InvalidQuery(message) => OperationError::InvalidSearch(message),
            DocumentStoreError::Cancelled => OperationError::Cancelled,
            DocumentStoreError::DocumentAlreadyExists(id, _) => OperationError::DuplicateObject(id),
            DocumentStoreError::Write(_) => OperationError::GenericWriteFailure {
                message: "Unable to write changes to the store".to_string(),
                detail: format!("Generic exception in {location}: {err}"),
            },
            other => OperationError::GenericWriteFailure {
                message: "Generic problem in the store".to_string(),
                detail: format!("Generic exception in {location}: {other}"),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::ObjectNotFound { .. } => ErrorKind::ObjectNotFound,
            OperationError::DuplicateObject(_) => ErrorKind::DuplicateObject,
            OperationError::DuplicateName(_) => ErrorKind::DuplicateName,
            OperationError::GenericWriteFailure { .. } => ErrorKind::GenericWriteFailure,
            OperationError::ConcurrentModification(_) => ErrorKind::ConcurrentModification,
            OperationError::InvalidSearch(_) => ErrorKind::InvalidSearch,
            OperationError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            OperationError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Internal detail for logging, if the error carries more than its message.
    pub fn detail(&self) -> Option<&str> {
        match self {
            OperationError::GenericWriteFailure { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

/// Attaches an operation location to store results.
pub trait StoreResultExt<T> {
    fn in_operation(self, location: &str) -> Result<T, OperationError>;
}

impl<T> StoreResultExt<T> for DocumentStoreResult<T> {
    fn in_operation(self, location: &str) -> Result<T, OperationError> {
        self.map_err(|err| OperationError::from_store(err, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_sanitized() {
        let err = OperationError::from_store(
            DocumentStoreError::Backend("connection reset by peer".to_string()),
            "contacts::update",
        );

        assert_eq!(err.kind(), ErrorKind::GenericWriteFailure);
        assert!(!err.to_string().contains("connection reset"));
        assert_eq!(
            err.detail(),
            Some("Generic exception in contacts::update: Backend error: connection reset by peer"),
        );
    }

    #[test]
    fn write_errors_get_their_own_message() {
        let err = OperationError::from_store(DocumentStoreError::Write("E11000".into()), "add");

        assert_eq!(err.to_string(), "Unable to write changes to the store");
    }

    #[test]
    fn planning_errors_keep_their_kind() {
        assert_eq!(
            OperationError::from_store(DocumentStoreError::InvalidQuery("bad".into()), "search").kind(),
            ErrorKind::InvalidSearch,
        );
        assert_eq!(
            OperationError::from_store(DocumentStoreError::Cancelled, "search"),
            OperationError::Cancelled,
        );
    }
}
