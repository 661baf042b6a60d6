//! Engine behavior switches.

use serde::{Deserialize, Serialize};

/// Configuration shared by every collection of an [`EntityStore`](crate::store::EntityStore).
///
/// Deserializes from any serde format; missing keys take their defaults.
///
/// ```ignore
/// let config: EngineConfig = serde_json::from_str(r#"{ "validate_unique_names": false }"#)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reject adds and renames that collide with an existing name.
    pub validate_unique_names: bool,
    /// Drop references to missing entities from the proposed entity before an update is diffed.
    pub lookup_on_update: bool,
    /// Write back references pruned while reading an entity.
    pub persist_pruned_references: bool,
    /// Default for [`UpdateOptions::include_dependency_fields`](crate::collection::UpdateOptions).
    pub include_dependency_fields: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validate_unique_names: true,
            lookup_on_update: true,
            persist_pruned_references: true,
            include_dependency_fields: false,
        }
    }
}

impl EngineConfig {
    pub fn with_unique_names(mut self, validate: bool) -> Self {
        self.validate_unique_names = validate;
        self
    }

    pub fn with_lookup_on_update(mut self, lookup: bool) -> Self {
        self.lookup_on_update = lookup;
        self
    }

    pub fn with_persisted_pruning(mut self, persist: bool) -> Self {
        self.persist_pruned_references = persist;
        self
    }

    pub fn with_dependency_fields(mut self, include: bool) -> Self {
        self.include_dependency_fields = include;
        self
    }
}
