//! Hydrator - converts between live settings objects and their normalized
//! representation, using metadata, converters and the storage adapter layer.
//!
//! Forward-compatible reads: unknown keys in a normalized map are silently
//! ignored, and missing keys leave the corresponding field untouched (the
//! migrate-then-hydrate sequence relies on that).

use std::sync::Arc;

use crate::contract::{NormalizedMap, ParamValue, SettingsError};
use crate::infra::storage::{AdapterRegistry, StorageOptions};

use super::convert::ConverterRegistry;
use super::env::EnvVarResolver;
use super::instance::SettingsObject;
use super::metadata::{EnvVarMode, ParameterMetadata, SettingsMetadata, ValueMapper};
use super::migration::VERSION_KEY;

pub struct Hydrator {
    converters: Arc<ConverterRegistry>,
    storage: Arc<AdapterRegistry>,
    env: Arc<EnvVarResolver>,
}

impl Hydrator {
    pub fn new(
        converters: Arc<ConverterRegistry>,
        storage: Arc<AdapterRegistry>,
        env: Arc<EnvVarResolver>,
    ) -> Self {
        Self {
            converters,
            storage,
            env,
        }
    }

    /// A settings object may only be used with the schema of its own class.
    fn check_class(obj: &SettingsObject, meta: &SettingsMetadata) -> Result<(), SettingsError> {
        if obj.class_name() == meta.class_name() {
            Ok(())
        } else {
            Err(SettingsError::ClassMismatch {
                expected: meta.class_name().to_owned(),
                actual: obj.class_name().to_owned(),
            })
        }
    }

    /// Read current field values into a fresh normalized map
    pub fn to_normalized(
        &self,
        obj: &SettingsObject,
        meta: &SettingsMetadata,
    ) -> Result<NormalizedMap, SettingsError> {
        Self::check_class(obj, meta)?;
        let mut map = NormalizedMap::new();
        for param in meta.parameters() {
            let value = obj.get(&param.property_name)?;
            map.insert(param.name.clone(), self.converters.normalize(value, param)?);
        }
        Ok(map)
    }

    /// Apply a normalized map onto an object's fields.
    ///
    /// Keys the schema does not know are ignored; parameters the map does not
    /// mention keep their current value.
    pub fn apply_normalized(
        &self,
        map: &NormalizedMap,
        obj: &mut SettingsObject,
        meta: &SettingsMetadata,
    ) -> Result<(), SettingsError> {
        Self::check_class(obj, meta)?;
        for param in meta.parameters() {
            if let Some(value) = map.get(&param.name) {
                let native = self.converters.denormalize(value, param)?;
                obj.set(param.property_name.as_str(), native)?;
            }
        }
        Ok(())
    }

    /// Load the raw stored map for a class, if any
    pub fn load_normalized(
        &self,
        meta: &SettingsMetadata,
        options: &StorageOptions,
    ) -> Result<Option<NormalizedMap>, SettingsError> {
        let adapter = self.storage.get(meta.storage_adapter())?;
        adapter
            .load(meta.storage_key(), options)
            .map_err(|source| SettingsError::Storage {
                adapter: meta.storage_adapter().to_owned(),
                source,
            })
    }

    /// Write a raw map through the class's storage adapter
    pub fn store_normalized(
        &self,
        meta: &SettingsMetadata,
        map: &NormalizedMap,
    ) -> Result<(), SettingsError> {
        let adapter = self.storage.get(meta.storage_adapter())?;
        adapter
            .save(meta.storage_key(), map, &StorageOptions::default())
            .map_err(|source| SettingsError::Storage {
                adapter: meta.storage_adapter().to_owned(),
                source,
            })
    }

    /// Load from storage and apply, then layer env overrides on top.
    ///
    /// No-op apart from env seeding when nothing is stored. Returns whether
    /// stored data existed.
    pub fn hydrate(
        &self,
        obj: &mut SettingsObject,
        meta: &SettingsMetadata,
    ) -> Result<bool, SettingsError> {
        Self::check_class(obj, meta)?;
        let stored = self.load_normalized(meta, &StorageOptions::default())?;
        if let Some(map) = &stored {
            self.apply_normalized(map, obj, meta)?;
        }
        self.apply_env_overrides(obj, meta, stored.as_ref())?;
        Ok(stored.is_some())
    }

    /// Write current field values through the storage adapter.
    ///
    /// Parameters overridden from env in `Overwrite` mode are not written
    /// back: the previously stored value is kept (or the key omitted when
    /// nothing was stored). `OverwritePersist` persists the live value.
    pub fn persist(
        &self,
        obj: &SettingsObject,
        meta: &SettingsMetadata,
    ) -> Result<(), SettingsError> {
        let mut map = self.to_normalized(obj, meta)?;

        let suppressed: Vec<&Arc<ParameterMetadata>> = meta
            .parameters()
            .iter()
            .filter(|p| {
                p.env_var
                    .as_ref()
                    .is_some_and(|b| b.mode == EnvVarMode::Overwrite && self.env.has_value(&b.expression))
            })
            .collect();
        if !suppressed.is_empty() {
            let previous = self
                .load_normalized(meta, &StorageOptions::default())?
                .unwrap_or_default();
            for param in suppressed {
                match previous.get(&param.name) {
                    Some(value) => {
                        map.insert(param.name.clone(), value.clone());
                    }
                    None => {
                        map.remove(&param.name);
                    }
                }
            }
        }

        // Freshly saved data is always at the schema's target version.
        if let Some(version) = meta.version() {
            map.insert(VERSION_KEY.to_owned(), version.into());
        }

        self.store_normalized(meta, &map)?;
        tracing::debug!(class = meta.class_name(), key = meta.storage_key(), "settings persisted");
        Ok(())
    }

    /// Apply env-bound values onto an object's fields.
    ///
    /// `stored` is the map the object was hydrated from, used to decide
    /// whether `Initial`-mode bindings may seed their parameter.
    pub fn apply_env_overrides(
        &self,
        obj: &mut SettingsObject,
        meta: &SettingsMetadata,
        stored: Option<&NormalizedMap>,
    ) -> Result<(), SettingsError> {
        Self::check_class(obj, meta)?;
        for param in meta.parameters() {
            let Some(binding) = &param.env_var else {
                continue;
            };
            let applies = match binding.mode {
                EnvVarMode::Initial => !stored.is_some_and(|m| m.contains_key(&param.name)),
                EnvVarMode::Overwrite | EnvVarMode::OverwritePersist => true,
            };
            if !applies || !self.env.has_value(&binding.expression) {
                continue;
            }
            let value = self.env.resolve(&binding.expression)?;
            let native = self.mapped_native(&value, binding.mapper.as_ref(), param)?;
            obj.set(param.property_name.as_str(), native)?;
        }
        Ok(())
    }

    /// Run a resolved env value through the binding's mapper, then into
    /// native form
    fn mapped_native(
        &self,
        value: &serde_json::Value,
        mapper: Option<&ValueMapper>,
        param: &ParameterMetadata,
    ) -> Result<ParamValue, SettingsError> {
        match mapper {
            None => self.converters.denormalize(value, param),
            Some(ValueMapper::Closure(f)) => self.converters.denormalize(&f(value.clone()), param),
            Some(ValueMapper::Converter(t)) => self.converters.denormalize_as(*t, value, param),
        }
    }
}
