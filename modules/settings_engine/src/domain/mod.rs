//! Domain layer - metadata, conversion, hydration and the settings service

pub mod cache;
pub mod cloner;
pub mod convert;
pub mod env;
pub mod forms;
pub mod hydrator;
pub mod instance;
pub mod metadata;
pub mod migration;
pub mod registry;
pub mod service;

pub use cache::SettingsCacher;
pub use cloner::Cloner;
pub use convert::{ConverterRegistry, ParameterConverter};
pub use env::{base_name, EnvSource, EnvVarResolver};
pub use forms::{form_field_for, FormField, FormFieldType};
pub use hydrator::Hydrator;
pub use instance::{EmbedInit, EmbeddedSlot, SettingsHandle, SettingsObject};
pub use metadata::{
    EmbeddedBuilder, EmbeddedSettingsMetadata, EnumDef, EnvVarBinding, EnvVarMode,
    ParameterBuilder, ParameterMetadata, ParameterOptions, SettingsClassBuilder, SettingsHook,
    SettingsMetadata, ValueMapper,
};
pub use migration::{
    current_version, MigrationHelper, MigrationManager, Migrator, StepMigrator, VERSION_KEY,
};
pub use registry::{ClassManifest, MetadataRegistry};
pub use service::Service;
