//! Datetime converter
//!
//! Interchange format is RFC 3339; the stored string round-trips
//! byte-for-byte through parse-then-format.

use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

use crate::contract::{ParamValue, SettingsError};
use crate::domain::metadata::ParameterMetadata;

use super::{conversion_error, native_null, normalized_null, ConverterRegistry, ParameterConverter};

pub struct DateTimeConverter;

impl ParameterConverter for DateTimeConverter {
    fn to_normalized(
        &self,
        value: &ParamValue,
        meta: &ParameterMetadata,
        _registry: &ConverterRegistry,
    ) -> Result<Value, SettingsError> {
        match value {
            ParamValue::Null => normalized_null(meta),
            ParamValue::DateTime(dt) => Ok(Value::String(
                dt.to_rfc3339_opts(SecondsFormat::Secs, false),
            )),
            other => Err(conversion_error(
                meta,
                format!("expected datetime, got {}", other.kind()),
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
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(ParamValue::DateTime)
                .map_err(|e| conversion_error(meta, format!("'{s}' is not RFC 3339: {e}"))),
            other => Err(conversion_error(
                meta,
                format!("expected RFC 3339 string, got {other}"),
            )),
        }
    }
}
