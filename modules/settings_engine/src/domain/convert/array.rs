//! Array converter
//!
//! Delegates per-element to the sub-converter named by the parameter's
//! options bag, synthesizing a transient element metadata that carries the
//! sub-type and nested options. Nesting arrays of arrays works by carrying
//! another level of element options.

use serde_json::Value;

use crate::contract::{ParamValue, SettingsError};
use crate::domain::metadata::{ParameterMetadata, ParameterOptions};

use super::{conversion_error, native_null, normalized_null, ConverterRegistry, ParameterConverter};

pub struct ArrayConverter;

fn element_meta(meta: &ParameterMetadata) -> Result<ParameterMetadata, SettingsError> {
    let element_type = meta
        .options
        .element_type
        .ok_or_else(|| conversion_error(meta, "array parameter has no element type".to_owned()))?;
    let options = meta
        .options
        .element_options
        .as_deref()
        .cloned()
        .unwrap_or_else(ParameterOptions::default);
    Ok(ParameterMetadata {
        class: meta.class.clone(),
        property_name: format!("{}[]", meta.property_name),
        name: format!("{}[]", meta.name),
        param_type: element_type,
        nullable: meta.nullable,
        label: None,
        description: None,
        options,
        form_type: None,
        form_options: serde_json::Map::new(),
        groups: Vec::new(),
        env_var: None,
        cloneable: meta.cloneable,
        default: ParamValue::Null,
    })
}

impl ParameterConverter for ArrayConverter {
    fn to_normalized(
        &self,
        value: &ParamValue,
        meta: &ParameterMetadata,
        registry: &ConverterRegistry,
    ) -> Result<Value, SettingsError> {
        match value {
            ParamValue::Null => normalized_null(meta),
            ParamValue::Array(items) => {
                let element = element_meta(meta)?;
                let converter = registry.get(element.param_type)?;
                items
                    .iter()
                    .map(|item| converter.to_normalized(item, &element, registry))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            other => Err(conversion_error(
                meta,
                format!("expected array, got {}", other.kind()),
            )),
        }
    }

    fn to_native(
        &self,
        value: &Value,
        meta: &ParameterMetadata,
        registry: &ConverterRegistry,
    ) -> Result<ParamValue, SettingsError> {
        match value {
            Value::Null => native_null(meta),
            Value::Array(items) => {
                let element = element_meta(meta)?;
                let converter = registry.get(element.param_type)?;
                items
                    .iter()
                    .map(|item| converter.to_native(item, &element, registry))
                    .collect::<Result<Vec<_>, _>>()
                    .map(ParamValue::Array)
            }
            other => Err(conversion_error(meta, format!("expected array, got {other}"))),
        }
    }
}
