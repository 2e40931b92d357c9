//! In-memory storage adapter

use std::collections::HashMap;

use anyhow::Result;
use parking_lot::RwLock;

use crate::contract::NormalizedMap;

use super::{StorageAdapter, StorageOptions};

/// Volatile storage adapter backed by a process-local map.
///
/// Primarily for tests and ephemeral settings; data does not survive the
/// process.
#[derive(Default)]
pub struct MemoryStorageAdapter {
    data: RwLock<HashMap<String, NormalizedMap>>,
}

impl MemoryStorageAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Drop all stored data
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl StorageAdapter for MemoryStorageAdapter {
    fn save(&self, key: &str, data: &NormalizedMap, _options: &StorageOptions) -> Result<()> {
        self.data.write().insert(key.to_owned(), data.clone());
        Ok(())
    }

    fn load(&self, key: &str, _options: &StorageOptions) -> Result<Option<NormalizedMap>> {
        Ok(self.data.read().get(key).cloned())
    }
}
