//! The uniform result envelope returned by every entity operation.

use serde::{Deserialize, Serialize};

use crate::error::OperationError;

/// Discriminant of an [`OperationError`], for callers that match on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ObjectNotFound,
    DuplicateObject,
    DuplicateName,
    GenericWriteFailure,
    ConcurrentModification,
    InvalidSearch,
    InvalidArgument,
    Cancelled,
}

/// Outcome of an entity operation.
///
/// Store errors never cross this boundary: `error_message` is safe to show,
/// `error_detail` is the internal description that was also logged.
///
/// # Example
///
/// ```ignore
/// let result = contacts.get(&ctx, id, GetOptions::default()).await;
///
/// if let Some(resolved) = result.payload {
///     println!("{:?}", resolved.entity);
/// } else {
///     eprintln!("{}", result.error_message.unwrap_or_default());
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub payload: Option<T>,
}

impl<T> OperationResult<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            error_message: None,
            error_detail: None,
            error_kind: None,
            payload: Some(payload),
        }
    }

    pub fn failure(error: OperationError) -> Self {
        Self {
            success: false,
            error_message: Some(error.to_string()),
            error_detail: error.detail().map(str::to_string),
            error_kind: Some(error.kind()),
            payload: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the payload of a successful result.
    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        OperationResult {
            success: self.success,
            error_message: self.error_message,
            error_detail: self.error_detail,
            error_kind: self.error_kind,
            payload: self.payload.map(f),
        }
    }
}

impl<T> From<Result<T, OperationError>> for OperationResult<T> {
    fn from(result: Result<T, OperationError>) -> Self {
        match result {
            Ok(payload) => OperationResult::ok(payload),
            Err(err) => OperationResult::failure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_carries_kind_and_detail() {
        let result: OperationResult<()> = OperationResult::failure(OperationError::GenericWriteFailure {
            message: "Unable to write changes to the store".into(),
            detail: "Generic exception in add: Write error: E11000".into(),
        });

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::GenericWriteFailure));
        assert_eq!(result.error_message.as_deref(), Some("Unable to write changes to the store"));
        assert!(result.error_detail.unwrap().contains("E11000"));
    }

    #[test]
    fn serializes_as_flat_envelope() {
        let json = serde_json::to_value(OperationResult::ok(3_u64)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["payload"], 3);
        assert!(json["error_message"].is_null());
    }
}
