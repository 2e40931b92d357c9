//! Enum converter
//!
//! Maps between declared case names and their persisted ordinals through the
//! enum definition in the parameter's options bag.

use serde_json::Value;

use crate::contract::{ParamValue, SettingsError};
use crate::domain::metadata::{EnumDef, ParameterMetadata};

use super::{conversion_error, native_null, normalized_null, ConverterRegistry, ParameterConverter};

pub struct EnumConverter;

fn enum_def<'a>(meta: &'a ParameterMetadata) -> Result<&'a EnumDef, SettingsError> {
    meta.options
        .enum_def
        .as_deref()
        .ok_or_else(|| conversion_error(meta, "parameter has no enum definition".to_owned()))
}

impl ParameterConverter for EnumConverter {
    fn to_normalized(
        &self,
        value: &ParamValue,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<Value, SettingsError> {
        match value {
            ParamValue::Null => normalized_null(meta),
            ParamValue::EnumCase(case) => {
                let def = enum_def(meta)?;
                def.ordinal_of(case).map(Value::from).ok_or_else(|| {
                    conversion_error(
                        meta,
                        format!("'{case}' is not a case of enum '{}'", def.name()),
                    )
                })
            }
            other => Err(conversion_error(
                meta,
                format!("expected enum case, got {}", other.kind()),
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
            Value::Number(n) => {
                let def = enum_def(meta)?;
                let ordinal = n
                    .as_i64()
                    .ok_or_else(|| conversion_error(meta, format!("'{n}' is not an ordinal")))?;
                def.case_of(ordinal)
                    .map(|case| ParamValue::EnumCase(case.to_owned()))
                    .ok_or_else(|| {
                        conversion_error(
                            meta,
                            format!("enum '{}' has no case with ordinal {ordinal}", def.name()),
                        )
                    })
            }
            other => Err(conversion_error(
                meta,
                format!("expected enum ordinal, got {other}"),
            )),
        }
    }
}
