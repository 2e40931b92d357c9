//! Settings service - the single entry point application code talks to
//!
//! Owns the metadata registry, the storage and converter registries, the
//! hydrator, the migration manager, the settings cache and a process-local
//! instance cache. Instances are created here only; embedded settings resolve
//! lazily through the service itself, which is what lets circular embeddings
//! work.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::config::Config;
use crate::contract::SettingsError;
use crate::infra::storage::AdapterRegistry;

use super::cache::SettingsCacher;
use super::cloner::Cloner;
use super::convert::ConverterRegistry;
use super::env::EnvVarResolver;
use super::forms::{form_field_for, FormField};
use super::hydrator::Hydrator;
use super::instance::{EmbedInit, EmbeddedSlot, SettingsHandle, SettingsObject};
use super::metadata::{SettingsClassBuilder, SettingsMetadata};
use super::migration::{MigrationManager, Migrator};
use super::registry::MetadataRegistry;

pub struct Service {
    registry: Arc<MetadataRegistry>,
    storage: Arc<AdapterRegistry>,
    hydrator: Hydrator,
    cacher: SettingsCacher,
    migrations: MigrationManager,
    cloner: Cloner,
    instances: RwLock<HashMap<String, SettingsHandle>>,
}

impl Service {
    /// Service backed by the process environment
    pub fn new(config: Config) -> Arc<Self> {
        Self::with_env(config, Arc::new(EnvVarResolver::new()))
    }

    /// Service with an explicit env source, for tests and embedding
    pub fn with_env(config: Config, env: Arc<EnvVarResolver>) -> Arc<Self> {
        let storage = Arc::new(AdapterRegistry::with_builtins(&config));
        let converters = Arc::new(ConverterRegistry::with_builtins());
        let registry = Arc::new(MetadataRegistry::new(&config));
        let hydrator = Hydrator::new(converters.clone(), storage.clone(), env.clone());
        let cacher = SettingsCacher::new(env.clone(), &config);
        let migrations = MigrationManager::new(converters, env);
        Arc::new(Self {
            registry,
            storage,
            hydrator,
            cacher,
            migrations,
            cloner: Cloner::new(),
            instances: RwLock::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<AdapterRegistry> {
        &self.storage
    }

    pub fn migrations(&self) -> &MigrationManager {
        &self.migrations
    }

    pub fn cacher(&self) -> &SettingsCacher {
        &self.cacher
    }

    /// Register a settings class declaration
    pub fn register_class<F>(&self, manifest: F) -> Result<Arc<SettingsMetadata>, SettingsError>
    where
        F: Fn() -> SettingsClassBuilder + Send + Sync + 'static,
    {
        self.registry.register(manifest)
    }

    /// Register the migrator a versioned class refers to by id
    pub fn register_migrator(&self, id: impl Into<String>, migrator: Arc<dyn Migrator>) {
        self.migrations.register(id, migrator);
    }

    pub fn is_settings_class(&self, class: &str) -> bool {
        self.registry.is_settings_class(class)
    }

    /// Get the shared instance of a settings class, creating it on first use.
    ///
    /// Creation order: settings cache, then storage (upgrading stored data
    /// first when its version lags), then declared defaults; env-bound
    /// parameters are layered on top in every case.
    pub fn get(self: &Arc<Self>, class: &str) -> Result<SettingsHandle, SettingsError> {
        if let Some(handle) = self.instances.read().get(class) {
            return Ok(handle.clone());
        }

        let meta = self.registry.get_settings_metadata(class)?;
        let mut obj = SettingsObject::from_defaults(meta.clone(), self.embed_slots(&meta));

        let applied = if self.cacher.has_data(&meta) {
            match self.cacher.get_data(&meta) {
                Ok(map) => Some(map),
                Err(SettingsError::CacheMalformed { key, details }) => {
                    // A broken entry must not keep the class unreadable.
                    tracing::warn!(%key, %details, "dropping malformed settings cache entry");
                    self.cacher.invalidate_data(&meta);
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let stored = match applied {
            Some(map) => Some(map),
            None => {
                let loaded = self.load_upgraded(&meta)?;
                if loaded.is_none() {
                    tracing::debug!(class, "no stored settings, starting from defaults");
                }
                loaded
            }
        };
        if let Some(map) = &stored {
            self.hydrator.apply_normalized(map, &mut obj, &meta)?;
        }
        self.hydrator
            .apply_env_overrides(&mut obj, &meta, stored.as_ref())?;

        self.cacher
            .set_data(&meta, &self.hydrator.to_normalized(&obj, &meta)?);

        let handle: SettingsHandle = Arc::new(RwLock::new(obj));
        self.instances
            .write()
            .insert(class.to_owned(), handle.clone());
        Ok(handle)
    }

    /// Persist an instance and refresh its cache entry
    pub fn save(&self, handle: &SettingsHandle) -> Result<(), SettingsError> {
        let guard = handle.read();
        let meta = guard.class().clone();
        self.hydrator.persist(&guard, &meta)?;
        self.cacher
            .set_data(&meta, &self.hydrator.to_normalized(&guard, &meta)?);
        Ok(())
    }

    /// Persist every instance materialized so far
    pub fn save_all(&self) -> Result<(), SettingsError> {
        let handles: Vec<SettingsHandle> = self.instances.read().values().cloned().collect();
        for handle in handles {
            self.save(&handle)?;
        }
        Ok(())
    }

    /// Drop the shared instance and its cache entry, then rebuild from
    /// storage. Previously handed-out handles keep the old object.
    pub fn reload(self: &Arc<Self>, class: &str) -> Result<SettingsHandle, SettingsError> {
        let meta = self.registry.get_settings_metadata(class)?;
        self.instances.write().remove(class);
        self.cacher.invalidate_data(&meta);
        self.get(class)
    }

    /// Build metadata for every registered class and its embedded cascade, so
    /// declaration mistakes surface now rather than on first use
    pub fn warm_up(&self) -> Result<(), SettingsError> {
        for class in self.registry.class_names() {
            for reached in self.registry.resolve_embedded_cascade(&class)? {
                self.registry.get_settings_metadata(&reached)?;
            }
        }
        tracing::debug!("settings metadata warmed up");
        Ok(())
    }

    /// Independent working copy for edit-then-confirm flows
    pub fn create_temporary_copy(
        self: &Arc<Self>,
        class: &str,
    ) -> Result<SettingsHandle, SettingsError> {
        let source = self.get(class)?;
        self.cloner.clone_settings(&source)
    }

    /// Merge an edited working copy back onto the shared instance
    pub fn merge_temporary_copy(
        self: &Arc<Self>,
        copy: &SettingsHandle,
    ) -> Result<(), SettingsError> {
        let class = copy.read().class_name().to_owned();
        let target = self.get(&class)?;
        self.cloner.merge_settings(copy, &target)
    }

    /// Form fields for a class, optionally restricted to one group.
    ///
    /// A parameter without groups of its own falls back to the class's
    /// default groups.
    pub fn form_fields(
        &self,
        class: &str,
        group: Option<&str>,
    ) -> Result<Vec<FormField>, SettingsError> {
        let meta = self.registry.get_settings_metadata(class)?;
        Ok(meta
            .parameters()
            .iter()
            .filter(|param| match group {
                None => true,
                Some(group) => {
                    let groups = if param.groups.is_empty() {
                        meta.default_groups()
                    } else {
                        param.groups.as_slice()
                    };
                    groups.iter().any(|g| g == group)
                }
            })
            .map(|param| form_field_for(param))
            .collect())
    }

    /// Stored data, upgraded and written back when its version lags
    fn load_upgraded(
        &self,
        meta: &Arc<SettingsMetadata>,
    ) -> Result<Option<crate::contract::NormalizedMap>, SettingsError> {
        let Some(stored) = self
            .hydrator
            .load_normalized(meta, &crate::infra::storage::StorageOptions::default())?
        else {
            return Ok(None);
        };
        if !self.migrations.requires_upgrade(meta, &stored, None) {
            return Ok(Some(stored));
        }
        let upgraded = self.migrations.perform_upgrade(meta, stored, None)?;
        self.hydrator.store_normalized(meta, &upgraded)?;
        Ok(Some(upgraded))
    }

    /// Lazy slots for a class's embedded properties; each initializer fetches
    /// the target class's shared instance through the service on first access
    fn embed_slots(self: &Arc<Self>, meta: &SettingsMetadata) -> HashMap<String, EmbeddedSlot> {
        meta.embedded()
            .iter()
            .map(|embed| {
                let weak: Weak<Self> = Arc::downgrade(self);
                let target = embed.target_class.clone();
                let init: EmbedInit = Arc::new(move || {
                    let service = weak.upgrade().ok_or_else(|| {
                        SettingsError::Internal("settings service was dropped".to_owned())
                    })?;
                    service.get(&target)
                });
                (embed.property_name.clone(), EmbeddedSlot::Pending(init))
            })
            .collect()
    }
}
