use async_trait::async_trait;
use bson::Uuid;

use docbridge_core::{
    access::AccessControl,
    backend::StoreBackend,
    collection::EntityCollection,
    context::OperationContext,
    result::OperationResult,
};

use super::{PhoneBookCategory, PhoneBookContact};

/// Relation mutators of contacts.
///
/// Every mutator is idempotent and reports whether the stored id list changed.
#[async_trait]
pub trait ContactAssociations {
    async fn associate_with_category(&self, ctx: &OperationContext, contact: Uuid, category: Uuid) -> OperationResult<bool>;

    async fn remove_category(&self, ctx: &OperationContext, contact: Uuid, category: Uuid) -> OperationResult<bool>;

    async fn add_to_phone_book(&self, ctx: &OperationContext, contact: Uuid, phone_book: Uuid) -> OperationResult<bool>;

    async fn remove_from_phone_book(&self, ctx: &OperationContext, contact: Uuid, phone_book: Uuid) -> OperationResult<bool>;

    async fn add_secretary(&self, ctx: &OperationContext, contact: Uuid, secretary: Uuid) -> OperationResult<bool>;

    async fn remove_secretary(&self, ctx: &OperationContext, contact: Uuid, secretary: Uuid) -> OperationResult<bool>;

    /// Sets or, with `None`, clears the manager.
    async fn set_manager(&self, ctx: &OperationContext, contact: Uuid, manager: Option<Uuid>) -> OperationResult<bool>;
}

#[async_trait]
impl<'a, B: StoreBackend, A: AccessControl> ContactAssociations for EntityCollection<'a, B, A, PhoneBookContact> {
    async fn associate_with_category(&self, ctx: &OperationContext, contact: Uuid, category: Uuid) -> OperationResult<bool> {
        self.associate(ctx, contact, "category_ids", category).await
    }

    async fn remove_category(&self, ctx: &OperationContext, contact: Uuid, category: Uuid) -> OperationResult<bool> {
        self.dissociate(ctx, contact, "category_ids", category).await
    }

    async fn add_to_phone_book(&self, ctx: &OperationContext, contact: Uuid, phone_book: Uuid) -> OperationResult<bool> {
        self.associate(ctx, contact, "phone_book_ids", phone_book).await
    }

    async fn remove_from_phone_book(&self, ctx: &OperationContext, contact: Uuid, phone_book: Uuid) -> OperationResult<bool> {
        self.dissociate(ctx, contact, "phone_book_ids", phone_book).await
    }

    async fn add_secretary(&self, ctx: &OperationContext, contact: Uuid, secretary: Uuid) -> OperationResult<bool> {
        self.associate(ctx, contact, "secretary_ids", secretary).await
    }

    async fn remove_secretary(&self, ctx: &OperationContext, contact: Uuid, secretary: Uuid) -> OperationResult<bool> {
        self.dissociate(ctx, contact, "secretary_ids", secretary).await
    }

    async fn set_manager(&self, ctx: &OperationContext, contact: Uuid, manager: Option<Uuid>) -> OperationResult<bool> {
        self.set_reference(ctx, contact, "manager_id", manager).await
    }
}

/// Relation mutators of categories.
#[async_trait]
pub trait CategoryAssociations {
    async fn add_to_phone_book(&self, ctx: &OperationContext, category: Uuid, phone_book: Uuid) -> OperationResult<bool>;

    async fn remove_from_phone_book(&self, ctx: &OperationContext, category: Uuid, phone_book: Uuid) -> OperationResult<bool>;
}

#[async_trait]
impl<'a, B: StoreBackend, A: AccessControl> CategoryAssociations for EntityCollection<'a, B, A, PhoneBookCategory> {
    async fn add_to_phone_book(&self, ctx: &OperationContext, category: Uuid, phone_book: Uuid) -> OperationResult<bool> {
        self.associate(ctx, category, "phone_book_ids", phone_book).await
    }

    async fn remove_from_phone_book(&self, ctx: &OperationContext, category: Uuid, phone_book: Uuid) -> OperationResult<bool> {
        self.dissociate(ctx, category, "phone_book_ids", phone_book).await
    }
}
