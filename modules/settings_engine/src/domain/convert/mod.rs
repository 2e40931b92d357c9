//! Parameter type converters
//!
//! Converters are the single source of truth for a parameter value's
//! JSON-safe shape and its inverse. They are total over their declared
//! domain: null passes through transparently when the parameter is nullable,
//! and any other invalid input is a fatal conversion error, never a coercion.

pub mod array;
pub mod datetime;
pub mod enums;
pub mod object;
pub mod scalar;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::contract::{ParamType, ParamValue, SettingsError};

use super::metadata::ParameterMetadata;

pub use array::ArrayConverter;
pub use datetime::DateTimeConverter;
pub use enums::EnumConverter;
pub use object::ObjectConverter;
pub use scalar::{BoolConverter, FloatConverter, IntConverter, StringConverter};

/// Bidirectional converter between native and normalized values.
///
/// Composite converters receive the registry so they can delegate
/// per-element.
pub trait ParameterConverter: Send + Sync {
    fn to_normalized(
        &self,
        value: &ParamValue,
        meta: &ParameterMetadata,
        registry: &ConverterRegistry,
    ) -> Result<Value, SettingsError>;

    fn to_native(
        &self,
        value: &Value,
        meta: &ParameterMetadata,
        registry: &ConverterRegistry,
    ) -> Result<ParamValue, SettingsError>;
}

/// Typed converter registry, resolved once per parameter type
pub struct ConverterRegistry {
    converters: HashMap<ParamType, Arc<dyn ParameterConverter>>,
}

impl ConverterRegistry {
    /// Registry with every built-in converter
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            converters: HashMap::new(),
        };
        registry.register(ParamType::Bool, Arc::new(BoolConverter));
        registry.register(ParamType::Int, Arc::new(IntConverter));
        registry.register(ParamType::Float, Arc::new(FloatConverter));
        registry.register(ParamType::String, Arc::new(StringConverter));
        registry.register(ParamType::DateTime, Arc::new(DateTimeConverter));
        registry.register(ParamType::Enum, Arc::new(EnumConverter));
        registry.register(ParamType::Array, Arc::new(ArrayConverter));
        registry.register(ParamType::Object, Arc::new(ObjectConverter));
        registry
    }

    pub fn register(&mut self, param_type: ParamType, converter: Arc<dyn ParameterConverter>) {
        self.converters.insert(param_type, converter);
    }

    pub fn get(
        &self,
        param_type: ParamType,
    ) -> Result<&Arc<dyn ParameterConverter>, SettingsError> {
        self.converters
            .get(&param_type)
            .ok_or(SettingsError::UnknownConverter(param_type))
    }

    /// Normalize a value using the converter declared by the parameter
    pub fn normalize(
        &self,
        value: &ParamValue,
        meta: &ParameterMetadata,
    ) -> Result<Value, SettingsError> {
        self.get(meta.param_type)?.to_normalized(value, meta, self)
    }

    /// Denormalize a value using the converter declared by the parameter
    pub fn denormalize(
        &self,
        value: &Value,
        meta: &ParameterMetadata,
    ) -> Result<ParamValue, SettingsError> {
        self.get(meta.param_type)?.to_native(value, meta, self)
    }

    /// Denormalize through an explicitly chosen converter type, used by
    /// env-value mappers that reference a converter instead of a closure
    pub fn denormalize_as(
        &self,
        param_type: ParamType,
        value: &Value,
        meta: &ParameterMetadata,
    ) -> Result<ParamValue, SettingsError> {
        self.get(param_type)?.to_native(value, meta, self)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Null handling shared by all converters: pass-through when nullable,
/// fatal otherwise.
pub(crate) fn normalized_null(meta: &ParameterMetadata) -> Result<Value, SettingsError> {
    if meta.nullable {
        Ok(Value::Null)
    } else {
        Err(non_null_error(meta))
    }
}

pub(crate) fn native_null(meta: &ParameterMetadata) -> Result<ParamValue, SettingsError> {
    if meta.nullable {
        Ok(ParamValue::Null)
    } else {
        Err(non_null_error(meta))
    }
}

fn non_null_error(meta: &ParameterMetadata) -> SettingsError {
    SettingsError::Conversion {
        parameter: meta.name.clone(),
        details: "null is not allowed for a non-nullable parameter".to_owned(),
    }
}

pub(crate) fn conversion_error(meta: &ParameterMetadata, details: String) -> SettingsError {
    SettingsError::Conversion {
        parameter: meta.name.clone(),
        details,
    }
}
