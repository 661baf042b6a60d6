//! Main docbridge crate providing a unified interface to the engine.
//!
//! docbridge sits between typed domain models and a schemaless document store and adds
//! what the store lacks: typed search predicates, deterministic pagination, minimal
//! partial updates, and consistent denormalized references.
//!
//! This crate re-exports the engine from `docbridge-core`, the storage backends, and the
//! phone book domain model used throughout the documentation and tests.
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::InMemoryStore, phonebook::*};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = EntityStore::new(InMemoryStore::builder().build().await.unwrap());
//!     let ctx = OperationContext::new(Caller::user("jdoe"));
//!
//!     let contacts = store.collection::<PhoneBookContact>();
//!
//!     let anna = contacts
//!         .add(&ctx, PhoneBookContact::new("Anna", "Meier").with_location("Bern"))
//!         .await
//!         .payload
//!         .unwrap();
//!
//!     // Partial update: only the location is written.
//!     let moved = PhoneBookContact { location: Some("Basel".into()), ..anna.clone() };
//!     contacts.update_delta(&ctx, Delta::new(anna.id, moved).property("location")).await;
//!
//!     // Case-insensitive substring search, second page of ten.
//!     let page = contacts
//!         .search(&ctx, SearchParameters::builder().query("%eie").page(2).page_size(10).build())
//!         .await;
//!
//!     println!("{:?}", page.payload);
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod phonebook;
pub mod prelude;

pub use docbridge_core::{
    access, backend, cancel, collection, config, context, delta, diff, document, error, page, predicate, query,
    relation, result, schema, search, sort, store, value,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docbridge_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbridge_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
