//! Scalar converters: bool, int, float, string

use serde_json::Value;

use crate::contract::{ParamValue, SettingsError};
use crate::domain::metadata::ParameterMetadata;

use super::{conversion_error, native_null, normalized_null, ConverterRegistry, ParameterConverter};

pub struct BoolConverter;

impl ParameterConverter for BoolConverter {
    fn to_normalized(
        &self,
        value: &ParamValue,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<Value, SettingsError> {
        match value {
            ParamValue::Null => normalized_null(meta),
            ParamValue::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(conversion_error(
                meta,
                format!("expected bool, got {}", other.kind()),
            )),
        }
    }

    fn to_native(
        &self,
        value: &Value,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<ParamValue, SettingsError> {
        match value {
            Value::Null => native_null(meta),
            Value::Bool(b) => Ok(ParamValue::Bool(*b)),
            other => Err(conversion_error(meta, format!("expected bool, got {other}"))),
        }
    }
}

pub struct IntConverter;

impl ParameterConverter for IntConverter {
    fn to_normalized(
        &self,
        value: &ParamValue,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<Value, SettingsError> {
        match value {
            ParamValue::Null => normalized_null(meta),
            ParamValue::Int(i) => Ok(Value::from(*i)),
            other => Err(conversion_error(
                meta,
                format!("expected int, got {}", other.kind()),
            )),
        }
    }

    fn to_native(
        &self,
        value: &Value,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<ParamValue, SettingsError> {
        match value {
            Value::Null => native_null(meta),
            Value::Number(n) => n
                .as_i64()
                .map(ParamValue::Int)
                .ok_or_else(|| conversion_error(meta, format!("'{n}' is not an integer"))),
            other => Err(conversion_error(meta, format!("expected int, got {other}"))),
        }
    }
}

pub struct FloatConverter;

impl ParameterConverter for FloatConverter {
    fn to_normalized(
        &self,
        value: &ParamValue,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<Value, SettingsError> {
        match value {
            ParamValue::Null => normalized_null(meta),
            ParamValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| {
                    conversion_error(meta, format!("'{f}' is not representable in JSON"))
                }),
            other => Err(conversion_error(
                meta,
                format!("expected float, got {}", other.kind()),
            )),
        }
    }

    fn to_native(
        &self,
        value: &Value,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<ParamValue, SettingsError> {
        match value {
            Value::Null => native_null(meta),
            Value::Number(n) => n
                .as_f64()
                .map(ParamValue::Float)
                .ok_or_else(|| conversion_error(meta, format!("'{n}' is not a float"))),
            other => Err(conversion_error(meta, format!("expected float, got {other}"))),
        }
    }
}

pub struct StringConverter;

impl ParameterConverter for StringConverter {
    fn to_normalized(
        &self,
        value: &ParamValue,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<Value, SettingsError> {
        match value {
            ParamValue::Null => normalized_null(meta),
            ParamValue::Str(s) => Ok(Value::String(s.clone())),
            other => Err(conversion_error(
                meta,
                format!("expected string, got {}", other.kind()),
            )),
        }
    }

    fn to_native(
        &self,
        value: &Value,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<ParamValue, SettingsError> {
        match value {
            Value::Null => native_null(meta),
            Value::String(s) => Ok(ParamValue::Str(s.clone())),
            other => Err(conversion_error(meta, format!("expected string, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ParamType;
    use serde_json::json;

    fn param(param_type: ParamType, nullable: bool) -> ParameterMetadata {
        ParameterMetadata {
            class: "Test".to_owned(),
            property_name: "p".to_owned(),
            name: "p".to_owned(),
            param_type,
            nullable,
            label: None,
            description: None,
            options: Default::default(),
            form_type: None,
            form_options: serde_json::Map::new(),
            groups: Vec::new(),
            env_var: None,
            cloneable: true,
            default: ParamValue::Null,
        }
    }

    #[test]
    fn bool_round_trips() {
        let registry = ConverterRegistry::with_builtins();
        let meta = param(ParamType::Bool, false);
        let normalized = registry.normalize(&ParamValue::Bool(true), &meta).unwrap();
        assert_eq!(normalized, json!(true));
        assert_eq!(
            registry.denormalize(&normalized, &meta).unwrap(),
            ParamValue::Bool(true)
        );
    }

    #[test]
    fn non_bool_into_bool_converter_is_fatal() {
        let registry = ConverterRegistry::with_builtins();
        let meta = param(ParamType::Bool, false);
        assert!(matches!(
            registry.normalize(&ParamValue::Int(1), &meta),
            Err(SettingsError::Conversion { .. })
        ));
        assert!(matches!(
            registry.denormalize(&json!("true"), &meta),
            Err(SettingsError::Conversion { .. })
        ));
    }

    #[test]
    fn null_passes_only_when_nullable() {
        let registry = ConverterRegistry::with_builtins();
        let nullable = param(ParamType::Int, true);
        assert_eq!(
            registry.normalize(&ParamValue::Null, &nullable).unwrap(),
            Value::Null
        );
        assert_eq!(
            registry.denormalize(&Value::Null, &nullable).unwrap(),
            ParamValue::Null
        );

        let strict = param(ParamType::Int, false);
        assert!(registry.normalize(&ParamValue::Null, &strict).is_err());
        assert!(registry.denormalize(&Value::Null, &strict).is_err());
    }

    #[test]
    fn int_rejects_fractions() {
        let registry = ConverterRegistry::with_builtins();
        let meta = param(ParamType::Int, false);
        assert!(registry.denormalize(&json!(1.5), &meta).is_err());
        assert_eq!(
            registry.denormalize(&json!(100), &meta).unwrap(),
            ParamValue::Int(100)
        );
    }

    #[test]
    fn float_rejects_nan() {
        let registry = ConverterRegistry::with_builtins();
        let meta = param(ParamType::Float, false);
        assert!(registry.normalize(&ParamValue::Float(f64::NAN), &meta).is_err());
        assert_eq!(
            registry.normalize(&ParamValue::Float(-100.5), &meta).unwrap(),
            json!(-100.5)
        );
    }
}
