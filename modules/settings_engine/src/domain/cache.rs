//! Settings cache - secondary read cache for top-level parameter values
//!
//! Entries are keyed by the class's storage key plus a short fingerprint of
//! the environment variables that can influence its values, so the same class
//! caches separately under different env configurations. Payloads are stored
//! serialized; reading back distinguishes "nothing cached" from "cached but
//! malformed".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::contract::{NormalizedMap, SettingsError};

use super::env::EnvVarResolver;
use super::metadata::SettingsMetadata;

const FINGERPRINT_LEN: usize = 8;

struct CacheEntry {
    payload: String,
    stored_at: Instant,
}

pub struct SettingsCacher {
    env: Arc<EnvVarResolver>,
    ttl: Option<Duration>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl SettingsCacher {
    pub fn new(env: Arc<EnvVarResolver>, config: &Config) -> Self {
        Self {
            env,
            ttl: config.cache_ttl_seconds.map(Duration::from_secs),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache key for a class under the current environment.
    ///
    /// Classes without env-bound parameters use the bare storage key; others
    /// append a fingerprint hashed over the sorted `NAME=value` pairs of the
    /// affecting variables (absent variables hash as empty).
    pub fn cache_key(&self, meta: &SettingsMetadata) -> String {
        let vars = meta.cache_affecting_env_vars();
        if vars.is_empty() {
            return meta.storage_key().to_owned();
        }
        let mut hasher = Sha256::new();
        for name in vars {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(self.env.raw(name).unwrap_or_default().as_bytes());
            hasher.update(b"\n");
        }
        let fingerprint = hex::encode(hasher.finalize());
        format!("{}_{}", meta.storage_key(), &fingerprint[..FINGERPRINT_LEN])
    }

    fn expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }

    pub fn set_data(&self, meta: &SettingsMetadata, data: &NormalizedMap) {
        let key = self.cache_key(meta);
        let payload = serde_json::Value::Object(data.clone()).to_string();
        self.entries.write().insert(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn has_data(&self, meta: &SettingsMetadata) -> bool {
        let key = self.cache_key(meta);
        self.entries
            .read()
            .get(&key)
            .is_some_and(|entry| !self.expired(entry))
    }

    /// Read cached values back.
    ///
    /// Calling this without a prior `has_data` check is a contract violation;
    /// an absent or expired entry is `CacheMiss`, a present entry that does
    /// not parse back into a map is `CacheMalformed`.
    pub fn get_data(&self, meta: &SettingsMetadata) -> Result<NormalizedMap, SettingsError> {
        let key = self.cache_key(meta);
        let entries = self.entries.read();
        let entry = entries
            .get(&key)
            .filter(|entry| !self.expired(entry))
            .ok_or_else(|| SettingsError::CacheMiss(key.clone()))?;
        match serde_json::from_str(&entry.payload) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(other) => Err(SettingsError::CacheMalformed {
                key,
                details: format!("expected a map, found {other}"),
            }),
            Err(e) => Err(SettingsError::CacheMalformed {
                key,
                details: e.to_string(),
            }),
        }
    }

    pub fn invalidate_data(&self, meta: &SettingsMetadata) {
        let key = self.cache_key(meta);
        self.entries.write().remove(&key);
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metadata::{EnvVarMode, ParameterBuilder, SettingsClassBuilder};
    use serde_json::json;

    fn env_with(vars: &[(&str, &str)]) -> Arc<EnvVarResolver> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Arc::new(EnvVarResolver::with_source(Arc::new(move |name: &str| {
            vars.get(name).cloned()
        })))
    }

    fn class_with_env() -> SettingsMetadata {
        SettingsClassBuilder::new("CachedSettings")
            .parameter(
                ParameterBuilder::new("flag")
                    .default(true)
                    .env("bool:CACHE_FLAG", EnvVarMode::Overwrite),
            )
            .parameter(ParameterBuilder::new("plain").default("x"))
            .build("memory")
            .unwrap()
    }

    fn plain_class() -> SettingsMetadata {
        SettingsClassBuilder::new("PlainSettings")
            .parameter(ParameterBuilder::new("plain").default("x"))
            .build("memory")
            .unwrap()
    }

    fn sample() -> NormalizedMap {
        let mut map = NormalizedMap::new();
        map.insert("flag".to_owned(), json!(true));
        map
    }

    #[test]
    fn set_then_has_then_invalidate() {
        let cacher = SettingsCacher::new(env_with(&[]), &Config::default());
        let meta = plain_class();
        assert!(!cacher.has_data(&meta));

        cacher.set_data(&meta, &sample());
        assert!(cacher.has_data(&meta));
        assert_eq!(cacher.get_data(&meta).unwrap(), sample());

        cacher.invalidate_data(&meta);
        assert!(!cacher.has_data(&meta));
        assert!(matches!(
            cacher.get_data(&meta),
            Err(SettingsError::CacheMiss(_))
        ));
    }

    #[test]
    fn key_without_env_bindings_is_the_storage_key() {
        let cacher = SettingsCacher::new(env_with(&[]), &Config::default());
        assert_eq!(cacher.cache_key(&plain_class()), "PlainSettings");
    }

    #[test]
    fn affecting_env_var_changes_the_key() {
        let meta = class_with_env();
        let a = SettingsCacher::new(env_with(&[("CACHE_FLAG", "true")]), &Config::default());
        let b = SettingsCacher::new(env_with(&[("CACHE_FLAG", "false")]), &Config::default());
        let key_a = a.cache_key(&meta);
        let key_b = b.cache_key(&meta);
        assert_ne!(key_a, key_b);
        assert!(key_a.starts_with("CachedSettings_"));
    }

    #[test]
    fn non_affecting_env_var_keeps_the_key() {
        let meta = class_with_env();
        let a = SettingsCacher::new(
            env_with(&[("CACHE_FLAG", "true"), ("UNRELATED", "1")]),
            &Config::default(),
        );
        let b = SettingsCacher::new(
            env_with(&[("CACHE_FLAG", "true"), ("UNRELATED", "2")]),
            &Config::default(),
        );
        assert_eq!(a.cache_key(&meta), b.cache_key(&meta));
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let cacher = SettingsCacher::new(
            env_with(&[]),
            &Config {
                cache_ttl_seconds: Some(0),
                ..Config::default()
            },
        );
        let meta = plain_class();
        cacher.set_data(&meta, &sample());
        assert!(!cacher.has_data(&meta));
        assert!(matches!(
            cacher.get_data(&meta),
            Err(SettingsError::CacheMiss(_))
        ));
    }

    #[test]
    fn invalidate_all_clears_every_class() {
        let cacher = SettingsCacher::new(env_with(&[]), &Config::default());
        let plain = plain_class();
        let other = class_with_env();
        cacher.set_data(&plain, &sample());
        cacher.set_data(&other, &sample());
        cacher.invalidate_all();
        assert!(!cacher.has_data(&plain));
        assert!(!cacher.has_data(&other));
    }
}
