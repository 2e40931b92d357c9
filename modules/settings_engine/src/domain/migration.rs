//! Migration manager - version-gated transformation of normalized data
//!
//! Stored maps carry their schema version in a reserved key. When the stored
//! version lags the class's declared target, the manager hands the map to the
//! migrator registered under the class's migrator id. Partial or silent
//! migrations never happen: a missing migrator or a missing intermediate step
//! is fatal before any data is touched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::contract::{NormalizedMap, ParamValue, SettingsError};

use super::convert::ConverterRegistry;
use super::env::{base_name, EnvVarResolver};
use super::metadata::{EnvVarMode, SettingsMetadata, ValueMapper};

/// Reserved key storing the schema version inside a normalized map
pub const VERSION_KEY: &str = "$version";

/// Version recorded in a stored map; unversioned data counts as 0
pub fn current_version(map: &NormalizedMap) -> u32 {
    map.get(VERSION_KEY)
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

/// Application-authored migration for one settings class
pub trait Migrator: Send + Sync {
    fn migrate(
        &self,
        meta: &SettingsMetadata,
        data: NormalizedMap,
        from: u32,
        to: u32,
        helper: &MigrationHelper,
    ) -> Result<NormalizedMap, SettingsError>;
}

/// One per-version step handler
pub type MigrationStep = Box<
    dyn Fn(&SettingsMetadata, &mut NormalizedMap, &MigrationHelper) -> Result<(), SettingsError>
        + Send
        + Sync,
>;

/// Migrator built from per-version step handlers.
///
/// Upgrading from `from` to `to` runs the handlers for versions
/// `from+1 ..= to` in ascending order; a missing intermediate handler aborts
/// before any step has run.
#[derive(Default)]
pub struct StepMigrator {
    steps: BTreeMap<u32, MigrationStep>,
}

impl StepMigrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler that brings data from `version - 1` to `version`
    pub fn step<F>(mut self, version: u32, handler: F) -> Self
    where
        F: Fn(&SettingsMetadata, &mut NormalizedMap, &MigrationHelper) -> Result<(), SettingsError>
            + Send
            + Sync
            + 'static,
    {
        self.steps.insert(version, Box::new(handler));
        self
    }
}

impl Migrator for StepMigrator {
    fn migrate(
        &self,
        meta: &SettingsMetadata,
        mut data: NormalizedMap,
        from: u32,
        to: u32,
        helper: &MigrationHelper,
    ) -> Result<NormalizedMap, SettingsError> {
        for version in from + 1..=to {
            if !self.steps.contains_key(&version) {
                return Err(SettingsError::Migration {
                    class: meta.class_name().to_owned(),
                    details: format!("no step handler for version {version}"),
                });
            }
        }
        for version in from + 1..=to {
            // Presence of every step was checked above.
            if let Some(step) = self.steps.get(&version) {
                step(meta, &mut data, helper)?;
                tracing::debug!(
                    class = meta.class_name(),
                    version,
                    "migration step applied"
                );
            }
        }
        Ok(data)
    }
}

/// Conveniences handed to migrations: single-parameter access to a normalized
/// map in native form, and bulk import of env-bound values.
pub struct MigrationHelper {
    converters: Arc<ConverterRegistry>,
    env: Arc<EnvVarResolver>,
}

impl MigrationHelper {
    pub fn new(converters: Arc<ConverterRegistry>, env: Arc<EnvVarResolver>) -> Self {
        Self { converters, env }
    }

    /// Native value of one parameter, `None` when the map has no entry for it
    pub fn read(
        &self,
        meta: &SettingsMetadata,
        map: &NormalizedMap,
        name: &str,
    ) -> Result<Option<ParamValue>, SettingsError> {
        let param = meta
            .parameter_by_name(name)
            .ok_or_else(|| SettingsError::UnknownProperty {
                class: meta.class_name().to_owned(),
                property: name.to_owned(),
            })?;
        map.get(name)
            .map(|value| self.converters.denormalize(value, param))
            .transpose()
    }

    /// Write one parameter into the map in normalized form
    pub fn write(
        &self,
        meta: &SettingsMetadata,
        map: &mut NormalizedMap,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), SettingsError> {
        let param = meta
            .parameter_by_name(name)
            .ok_or_else(|| SettingsError::UnknownProperty {
                class: meta.class_name().to_owned(),
                property: name.to_owned(),
            })?;
        map.insert(name.to_owned(), self.converters.normalize(&value.into(), param)?);
        Ok(())
    }

    /// Import env-bound parameter values into the map.
    ///
    /// `Initial` bindings only fill keys the map does not have yet;
    /// `Overwrite` and `OverwritePersist` always win. Returns the base names
    /// of the variables actually imported, for operator-facing reporting.
    pub fn apply_env_overrides(
        &self,
        meta: &SettingsMetadata,
        map: &mut NormalizedMap,
    ) -> Result<Vec<String>, SettingsError> {
        let mut touched = Vec::new();
        for param in meta.parameters() {
            let Some(binding) = &param.env_var else {
                continue;
            };
            let applies = match binding.mode {
                EnvVarMode::Initial => !map.contains_key(&param.name),
                EnvVarMode::Overwrite | EnvVarMode::OverwritePersist => true,
            };
            if !applies || !self.env.has_value(&binding.expression) {
                continue;
            }
            let resolved = self.env.resolve(&binding.expression)?;
            let native = match &binding.mapper {
                None => self.converters.denormalize(&resolved, param)?,
                Some(ValueMapper::Closure(f)) => {
                    self.converters.denormalize(&f(resolved), param)?
                }
                Some(ValueMapper::Converter(t)) => {
                    self.converters.denormalize_as(*t, &resolved, param)?
                }
            };
            map.insert(param.name.clone(), self.converters.normalize(&native, param)?);
            touched.push(base_name(&binding.expression).to_owned());
        }
        Ok(touched)
    }
}

/// Registry of migrators plus the upgrade entry points
pub struct MigrationManager {
    migrators: RwLock<HashMap<String, Arc<dyn Migrator>>>,
    helper: MigrationHelper,
}

impl MigrationManager {
    pub fn new(converters: Arc<ConverterRegistry>, env: Arc<EnvVarResolver>) -> Self {
        Self {
            migrators: RwLock::new(HashMap::new()),
            helper: MigrationHelper::new(converters, env),
        }
    }

    pub fn register(&self, id: impl Into<String>, migrator: Arc<dyn Migrator>) {
        self.migrators.write().insert(id.into(), migrator);
    }

    pub fn helper(&self) -> &MigrationHelper {
        &self.helper
    }

    /// Whether stored data lags the target version. Classes without a
    /// declared version never require an upgrade.
    pub fn requires_upgrade(
        &self,
        meta: &SettingsMetadata,
        map: &NormalizedMap,
        target: Option<u32>,
    ) -> bool {
        match target.or_else(|| meta.version()) {
            Some(target) => current_version(map) < target,
            None => false,
        }
    }

    /// Upgrade stored data to the target version and stamp the new version
    /// into the returned map. No-op when no upgrade is required.
    pub fn perform_upgrade(
        &self,
        meta: &SettingsMetadata,
        map: NormalizedMap,
        target: Option<u32>,
    ) -> Result<NormalizedMap, SettingsError> {
        let Some(target) = target.or_else(|| meta.version()) else {
            return Ok(map);
        };
        let from = current_version(&map);
        if from >= target {
            return Ok(map);
        }

        let migrator_id = meta.migrator().ok_or_else(|| SettingsError::Migration {
            class: meta.class_name().to_owned(),
            details: "class requires an upgrade but declares no migrator".to_owned(),
        })?;
        let migrator = self
            .migrators
            .read()
            .get(migrator_id)
            .cloned()
            .ok_or_else(|| SettingsError::Migration {
                class: meta.class_name().to_owned(),
                details: format!("no migrator registered under id '{migrator_id}'"),
            })?;

        tracing::info!(
            class = meta.class_name(),
            from,
            to = target,
            "migrating stored settings"
        );
        let mut upgraded = migrator.migrate(meta, map, from, target, &self.helper)?;
        upgraded.insert(VERSION_KEY.to_owned(), target.into());
        Ok(upgraded)
    }
}
