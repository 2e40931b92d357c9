//! Object converter
//!
//! The engine never inspects object internals; both directions delegate to
//! the codec carried in the parameter's options bag.

use serde_json::Value;

use crate::contract::{ObjectCodec, ParamValue, SettingsError};
use crate::domain::metadata::ParameterMetadata;

use super::{conversion_error, native_null, normalized_null, ConverterRegistry, ParameterConverter};

pub struct ObjectConverter;

fn codec<'a>(meta: &'a ParameterMetadata) -> Result<&'a dyn ObjectCodec, SettingsError> {
    meta.options
        .object_codec
        .as_deref()
        .ok_or_else(|| conversion_error(meta, "object parameter has no codec".to_owned()))
}

impl ParameterConverter for ObjectConverter {
    fn to_normalized(
        &self,
        value: &ParamValue,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<Value, SettingsError> {
        match value {
            ParamValue::Null => normalized_null(meta),
            ParamValue::Object(object) => codec(meta)?.encode(object.as_ref()),
            other => Err(conversion_error(
                meta,
                format!("expected object, got {}", other.kind()),
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
            other => codec(meta)?.decode(other).map(ParamValue::Object),
        }
    }
}
