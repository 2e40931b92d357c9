//! Configuration for the settings engine

use std::path::PathBuf;

use serde::Deserialize;

/// Settings engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Rebuild class metadata on every access instead of caching it for the
    /// process lifetime. Only useful while iterating on declarations.
    #[serde(default)]
    pub debug: bool,

    /// Storage adapter used by classes that do not pick one explicitly
    #[serde(default = "default_storage_adapter")]
    pub default_storage_adapter: String,

    /// Directory the JSON file storage adapter writes into
    #[serde(default = "default_file_storage_dir")]
    pub file_storage_dir: PathBuf,

    /// Default TTL for settings cache entries, in seconds (no expiry if unset)
    #[serde(default)]
    pub cache_ttl_seconds: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            default_storage_adapter: default_storage_adapter(),
            file_storage_dir: default_file_storage_dir(),
            cache_ttl_seconds: None,
        }
    }
}

fn default_storage_adapter() -> String {
    "memory".to_owned()
}

fn default_file_storage_dir() -> PathBuf {
    PathBuf::from("var/settings")
}
