//! Main entry point of the engine.
//!
//! An [`EntityStore`] owns a backend, an access-control collaborator and the engine
//! configuration, and hands out [`EntityCollection`]s for entity types.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::store::EntityStore;
//! use docbridge::memory::InMemoryStore;
//!
//! let store = EntityStore::builder(InMemoryStore::new())
//!     .with_config(EngineConfig::default().with_unique_names(false))
//!     .build();
//!
//! let contacts = store.collection::<PhoneBookContact>();
//! ```

use crate::{
    access::{AccessControl, AllowAll},
    backend::StoreBackend,
    collection::EntityCollection,
    config::EngineConfig,
    document::Entity,
    error::DocumentStoreResult,
};

/// A store of typed entities bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
/// * `A` - The access-control collaborator, [`AllowAll`] by default
#[derive(Debug)]
pub struct EntityStore<B: StoreBackend, A: AccessControl = AllowAll> {
    backend: B,
    access: A,
    config: EngineConfig,
}

impl<B: StoreBackend> EntityStore<B> {
    /// Creates a store that grants access to everything and uses the default configuration.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            access: AllowAll,
            config: EngineConfig::default(),
        }
    }

    pub fn builder(backend: B) -> EntityStoreBuilder<B> {
        EntityStoreBuilder {
            backend,
            access: AllowAll,
            config: EngineConfig::default(),
        }
    }
}

impl<B: StoreBackend, A: AccessControl> EntityStore<B, A> {
    /// Gets the collection of entity type `E`.
    pub fn collection<E: Entity>(&self) -> EntityCollection<'_, B, A, E> {
        EntityCollection::new(&self.backend, &self.access, self.config)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a new collection with the given name.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.create_collection(name).await
    }

    /// Drops (deletes) a collection with the given name.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts down the backend.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

/// Builder for [`EntityStore`].
#[derive(Debug)]
pub struct EntityStoreBuilder<B: StoreBackend, A: AccessControl = AllowAll> {
    backend: B,
    access: A,
    config: EngineConfig,
}

impl<B: StoreBackend, A: AccessControl> EntityStoreBuilder<B, A> {
    pub fn with_access_control<C: AccessControl>(self, access: C) -> EntityStoreBuilder<B, C> {
        EntityStoreBuilder {
            backend: self.backend,
            access,
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> EntityStore<B, A> {
        EntityStore {
            backend: self.backend,
            access: self.access,
            config: self.config,
        }
    }
}
