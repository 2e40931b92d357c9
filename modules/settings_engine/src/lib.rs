//! Settings Engine
//!
//! Metadata-driven settings management: settings classes are declared through
//! a builder manifest, instances are hydrated from pluggable key/value
//! storage, layered with environment-variable overrides, upgraded through
//! versioned migrations, cached, and cloned/merged for edit workflows.

// Public exports
pub mod contract;
pub use contract::{
    NormalizedMap, ObjectCodec, ObjectParam, ParamType, ParamValue, SettingsError,
};

pub mod config;
pub use config::Config;

pub mod domain;
pub use domain::{
    EmbeddedBuilder, EnumDef, EnvVarMode, EnvVarResolver, FormField, FormFieldType,
    ParameterBuilder, Service, SettingsClassBuilder, SettingsHandle, SettingsMetadata,
    StepMigrator, ValueMapper,
};

pub mod infra;
pub use infra::storage::{AdapterRegistry, StorageAdapter, StorageOptions};
