//! Per-call context: who is calling, and whether they still want the answer.

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;

/// The identity an operation runs on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: Option<String>,
}

impl Caller {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()) }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Passed to every entity operation.
///
/// ```ignore
/// let (handle, token) = CancelToken::new();
/// let ctx = OperationContext::new(Caller::user("jdoe")).with_cancel(token);
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub caller: Caller,
    pub cancel: CancelToken,
}

impl OperationContext {
    pub fn new(caller: Caller) -> Self {
        Self { caller, cancel: CancelToken::none() }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Value stamped into `updated_by` fields.
    pub fn stamp(&self) -> String {
        self.caller.user_id.clone().unwrap_or_default()
    }
}
