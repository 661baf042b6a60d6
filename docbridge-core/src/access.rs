//! Record-level access control.
//!
//! The engine asks an [`AccessControl`] implementation before exposing or changing an
//! entity. Inaccessible entities are reported as not found, never as forbidden.
//!
//! Searches run the candidates through [`AccessControl::accessible_ids`] before counting
//! and paging, unless the collaborator declares its
//! [`visibility_filter`](AccessControl::visibility_filter) complete, in which case the
//! store counts and pages on its own.

use async_trait::async_trait;
use bson::Uuid;
use std::fmt::Debug;

use crate::{context::Caller, error::DocumentStoreResult, query::Expr};

#[async_trait]
pub trait AccessControl: Send + Sync + Debug {
    /// Whether `caller` may see and change the entity `id` of `collection`.
    async fn is_accessible(&self, collection: &str, id: &Uuid, caller: &Caller) -> DocumentStoreResult<bool>;

    /// The subset of `ids` the caller may access, in the given order.
    async fn accessible_ids(&self, collection: &str, ids: &[Uuid], caller: &Caller) -> DocumentStoreResult<Vec<Uuid>> {
        let mut accessible = Vec::with_capacity(ids.len());

        for id in ids {
            if self.is_accessible(collection, id, caller).await? {
                accessible.push(*id);
            }
        }

        Ok(accessible)
    }

    /// An extra filter ANDed to every search and lookup of `collection`.
    fn visibility_filter(&self, _collection: &str, _caller: &Caller) -> Option<Expr> {
        None
    }

    /// Whether `visibility_filter` hides exactly the entities `is_accessible` rejects.
    fn visibility_filter_is_complete(&self, _collection: &str, _caller: &Caller) -> bool {
        false
    }
}

/// Grants access to everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AccessControl for AllowAll {
    async fn is_accessible(&self, _collection: &str, _id: &Uuid, _caller: &Caller) -> DocumentStoreResult<bool> {
        Ok(true)
    }

    async fn accessible_ids(&self, _collection: &str, ids: &[Uuid], _caller: &Caller) -> DocumentStoreResult<Vec<Uuid>> {
        Ok(ids.to_vec())
    }

    fn visibility_filter_is_complete(&self, _collection: &str, _caller: &Caller) -> bool {
        true
    }
}

#[async_trait]
impl<A> AccessControl for &A
where
    A: AccessControl,
{
    async fn is_accessible(&self, collection: &str, id: &Uuid, caller: &Caller) -> DocumentStoreResult<bool> {
        (*self).is_accessible(collection, id, caller).await
    }

    async fn accessible_ids(&self, collection: &str, ids: &[Uuid], caller: &Caller) -> DocumentStoreResult<Vec<Uuid>> {
        (*self).accessible_ids(collection, ids, caller).await
    }

    fn visibility_filter(&self, collection: &str, caller: &Caller) -> Option<Expr> {
        (*self).visibility_filter(collection, caller)
    }

    fn visibility_filter_is_complete(&self, collection: &str, caller: &Caller) -> bool {
        (*self).visibility_filter_is_complete(collection, caller)
    }
}
