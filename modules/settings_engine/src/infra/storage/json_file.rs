//! JSON file storage adapter
//!
//! One JSON document per file, holding every storage key saved to that file:
//! `{ "<storage key>": { ...normalized map... }, ... }`. Reads go through an
//! adapter-local cache keyed by file path; `force_reload` bypasses it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;

use crate::contract::NormalizedMap;

use super::{StorageAdapter, StorageOptions};

const DEFAULT_FILENAME: &str = "settings.json";

type Document = HashMap<String, NormalizedMap>;

pub struct JsonFileStorageAdapter {
    base_dir: PathBuf,
    cache: RwLock<HashMap<PathBuf, Document>>,
}

impl JsonFileStorageAdapter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn target_path(&self, options: &StorageOptions) -> PathBuf {
        match &options.filename {
            Some(name) => self.base_dir.join(name),
            None => self.base_dir.join(DEFAULT_FILENAME),
        }
    }

    fn read_document(&self, path: &Path) -> Result<Document> {
        if !path.exists() {
            return Ok(Document::new());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let doc: Document = serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        Ok(doc)
    }

    fn document(&self, path: &Path, force_reload: bool) -> Result<Document> {
        if !force_reload {
            if let Some(doc) = self.cache.read().get(path) {
                return Ok(doc.clone());
            }
        }
        let doc = self.read_document(path)?;
        self.cache.write().insert(path.to_path_buf(), doc.clone());
        Ok(doc)
    }

    fn write_document(&self, path: &Path, doc: &Document) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating settings directory {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(doc).context("serializing settings document")?;
        fs::write(path, raw)
            .with_context(|| format!("writing settings file {}", path.display()))?;
        self.cache.write().insert(path.to_path_buf(), doc.clone());
        Ok(())
    }
}

impl StorageAdapter for JsonFileStorageAdapter {
    fn save(&self, key: &str, data: &NormalizedMap, options: &StorageOptions) -> Result<()> {
        let path = self.target_path(options);
        // Re-read before writing so keys saved by others to the same file
        // survive; the write itself stays last-write-wins.
        let mut doc = self.document(&path, true)?;
        doc.insert(key.to_owned(), data.clone());
        self.write_document(&path, &doc)?;
        tracing::debug!(key, file = %path.display(), "settings saved");
        Ok(())
    }

    fn load(&self, key: &str, options: &StorageOptions) -> Result<Option<NormalizedMap>> {
        let path = self.target_path(options);
        let doc = self.document(&path, options.force_reload)?;
        Ok(doc.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> NormalizedMap {
        let mut map = NormalizedMap::new();
        map.insert("value1".to_owned(), json!("test"));
        map.insert("value3".to_owned(), json!(false));
        map
    }

    #[test]
    fn load_from_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileStorageAdapter::new(dir.path());
        let result = adapter.load("k", &StorageOptions::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn save_then_load_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample();
        {
            let adapter = JsonFileStorageAdapter::new(dir.path());
            adapter.save("k", &data, &StorageOptions::default()).unwrap();
        }
        // Fresh adapter, so the read cannot be served from the cache.
        let adapter = JsonFileStorageAdapter::new(dir.path());
        let loaded = adapter.load("k", &StorageOptions::default()).unwrap();
        assert_eq!(loaded, Some(data));
    }

    #[test]
    fn force_reload_sees_external_changes() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileStorageAdapter::new(dir.path());
        adapter.save("k", &sample(), &StorageOptions::default()).unwrap();

        // Another process overwrites the file behind our back.
        let other = JsonFileStorageAdapter::new(dir.path());
        let mut changed = NormalizedMap::new();
        changed.insert("value1".to_owned(), json!("changed"));
        other.save("k", &changed, &StorageOptions::default()).unwrap();

        // Cached read still returns the stale value; force_reload does not.
        let stale = adapter.load("k", &StorageOptions::default()).unwrap();
        assert_eq!(stale.and_then(|m| m.get("value1").cloned()), Some(json!("test")));

        let options = StorageOptions {
            force_reload: true,
            ..StorageOptions::default()
        };
        let fresh = adapter.load("k", &options).unwrap();
        assert_eq!(fresh.and_then(|m| m.get("value1").cloned()), Some(json!("changed")));
    }

    #[test]
    fn explicit_filename_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileStorageAdapter::new(dir.path());
        let options = StorageOptions {
            filename: Some(PathBuf::from("custom.json")),
            ..StorageOptions::default()
        };
        adapter.save("k", &sample(), &options).unwrap();

        assert!(dir.path().join("custom.json").exists());
        assert!(!dir.path().join(DEFAULT_FILENAME).exists());
        assert!(adapter.load("k", &options).unwrap().is_some());
        assert!(adapter.load("k", &StorageOptions::default()).unwrap().is_none());
    }
}
