//! Storage layer - key/value persistence behind a uniform contract
//!
//! Adapters persist one [`NormalizedMap`] per storage key. Writes are
//! last-write-wins; concurrency beyond that is the adapter's own concern.

pub mod json_file;
pub mod memory;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use crate::config::Config;
use crate::contract::{NormalizedMap, SettingsError};

pub use json_file::JsonFileStorageAdapter;
pub use memory::MemoryStorageAdapter;

/// Per-call options understood by storage adapters
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Target filename for file-based adapters (relative to their base
    /// directory); adapters without files ignore it.
    pub filename: Option<PathBuf>,

    /// Bypass any adapter-local read cache and hit the backing store.
    pub force_reload: bool,
}

/// Pluggable key to normalized-map persistence backend.
///
/// `load` of a never-saved key returns `Ok(None)`, never an error, and both
/// operations are safe to call with the same key repeatedly.
pub trait StorageAdapter: Send + Sync {
    fn save(&self, key: &str, data: &NormalizedMap, options: &StorageOptions) -> Result<()>;

    fn load(&self, key: &str, options: &StorageOptions) -> Result<Option<NormalizedMap>>;
}

/// Registry of storage adapters keyed by a stable identifier
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn StorageAdapter>>>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry pre-populated with the built-in adapters
    /// (`memory` and `json_file`).
    pub fn with_builtins(config: &Config) -> Self {
        let registry = Self::new();
        registry.register("memory", Arc::new(MemoryStorageAdapter::new()));
        registry.register(
            "json_file",
            Arc::new(JsonFileStorageAdapter::new(config.file_storage_dir.clone())),
        );
        registry
    }

    /// Register an adapter under an identifier, replacing any previous one
    pub fn register(&self, id: &str, adapter: Arc<dyn StorageAdapter>) {
        self.adapters.write().insert(id.to_owned(), adapter);
    }

    /// Resolve an adapter by identifier
    pub fn get(&self, id: &str) -> Result<Arc<dyn StorageAdapter>, SettingsError> {
        self.adapters
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SettingsError::UnknownStorageAdapter(id.to_owned()))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
