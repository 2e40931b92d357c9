//! Contract error types for the settings engine
//!
//! The taxonomy separates structural/configuration mistakes (always fatal,
//! surfaced as early as possible) from per-call value errors. The only
//! designed soft path in the crate is the env-var presence probe, which is a
//! boolean and never reaches this enum.

use super::model::ParamType;

/// Settings engine domain errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A settings class declaration is structurally broken (duplicate names,
    /// unresolvable type, missing migrator, ...). Programming mistake, never
    /// recoverable.
    #[error("invalid settings class '{class}': {details}")]
    InvalidClass { class: String, details: String },

    /// Lookup of a class that was never registered.
    #[error("settings class not registered: {0}")]
    UnknownClass(String),

    /// A class references a parameter property that its metadata does not
    /// declare.
    #[error("class '{class}' has no parameter or embed named '{property}'")]
    UnknownProperty { class: String, property: String },

    /// No converter is registered for the requested parameter type.
    #[error("no converter registered for parameter type {0:?}")]
    UnknownConverter(ParamType),

    /// No storage adapter is registered under the requested identifier.
    #[error("storage adapter not registered: {0}")]
    UnknownStorageAdapter(String),

    /// A value could not be converted to or from its normalized form.
    /// Invalid input is never silently coerced.
    #[error("parameter '{parameter}': {details}")]
    Conversion { parameter: String, details: String },

    /// A settings object was passed to a schema describing a different class.
    #[error("settings object of class '{actual}' used with schema for class '{expected}'")]
    ClassMismatch { expected: String, actual: String },

    /// `apply_data` was called without a prior `has_data` check.
    #[error("nothing cached under key '{0}'")]
    CacheMiss(String),

    /// A cache entry exists but can no longer be decoded against the schema.
    #[error("cached data under key '{key}' is malformed: {details}")]
    CacheMalformed { key: String, details: String },

    /// A parameter demands cloning but its runtime value refuses it.
    #[error("parameter '{parameter}' requires cloning but its value is not cloneable")]
    NotCloneable { parameter: String },

    /// Required upgrade without a migrator, or a missing step handler.
    /// Partial migrations would corrupt persisted state, so these are fatal.
    #[error("migration of class '{class}' failed: {details}")]
    Migration { class: String, details: String },

    /// An environment-variable expression could not be resolved.
    #[error("environment expression '{expression}': {details}")]
    Env { expression: String, details: String },

    /// A storage adapter failed while loading or saving.
    #[error("storage adapter '{adapter}' failed")]
    Storage {
        adapter: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}
