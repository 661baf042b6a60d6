//! The phone book domain: phone books, contact categories and contacts.
//!
//! | entity | collection | default sort | unique name |
//! |---|---|---|---|
//! | [`PhoneBook`] | `phone_books` | name | yes |
//! | [`PhoneBookCategory`] | `categories` | name | yes |
//! | [`PhoneBookContact`] | `contacts` | last name, first name | no |
//!
//! Contacts reference their manager, secretaries, categories and phone books by id.
//! Free-text queries on contacts match the first name, the last name or any phone number.

mod associations;
mod book;
mod category;
mod contact;
mod search;

pub use associations::{CategoryAssociations, ContactAssociations};
pub use book::{PHONE_BOOK_SCHEMA, PhoneBook};
pub use category::{CATEGORY_SCHEMA, CategorySettings, PhoneBookCategory};
pub use contact::{CONTACT_SCHEMA, ContactNumber, NumberType, PhoneBookContact};
pub use search::{CategorySearch, ContactSearch};

use docbridge_core::{access::AccessControl, backend::StoreBackend, document::Entity, error::DocumentStoreResult, store::EntityStore};

/// Creates the collections of the phone book entities that do not exist yet.
pub async fn create_collections<B: StoreBackend, A: AccessControl>(store: &EntityStore<B, A>) -> DocumentStoreResult<()> {
    for name in [
        PhoneBook::collection_name(),
        PhoneBookCategory::collection_name(),
        PhoneBookContact::collection_name(),
    ] {
        store.create_collection(name).await?;
    }

    Ok(())
}
