//! Contract models for the settings engine
//!
//! These models are the shared vocabulary between metadata, converters,
//! hydration, caching and storage. The normalized representation is the only
//! shape that is ever persisted or cached.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use super::error::SettingsError;

/// JSON-safe, string-keyed map: the wire contract for every storage adapter
/// and for the settings cache. Values are restricted to what
/// `serde_json::Value` can express.
pub type NormalizedMap = serde_json::Map<String, serde_json::Value>;

/// Stable identifier of a parameter converter.
///
/// Converters are resolved from a typed registry keyed by this enum rather
/// than by free-form strings, so an unknown type is unrepresentable at the
/// lookup site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Bool,
    Int,
    Float,
    String,
    DateTime,
    Enum,
    Array,
    Object,
}

/// Opaque application-defined object held by an object-valued parameter.
///
/// The runtime decides whether a given object can be cloned: returning `None`
/// from [`ObjectParam::try_clone_object`] marks the value as non-cloneable,
/// which is a fatal error when the owning parameter demands cloning.
pub trait ObjectParam: fmt::Debug + Send + Sync {
    /// Downcast access for application code.
    fn as_any(&self) -> &dyn Any;

    /// Produce an independent copy, or `None` if this object refuses cloning.
    fn try_clone_object(&self) -> Option<Arc<dyn ObjectParam>>;
}

/// Codec between an [`ObjectParam`] and its normalized representation.
///
/// Carried in the parameter's options bag and consumed by the object
/// converter; the engine itself never inspects object internals.
pub trait ObjectCodec: Send + Sync {
    fn encode(&self, object: &dyn ObjectParam) -> Result<serde_json::Value, SettingsError>;
    fn decode(&self, value: &serde_json::Value) -> Result<Arc<dyn ObjectParam>, SettingsError>;
}

/// Native value of a single settings parameter.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Datetimes round-trip byte-for-byte through RFC 3339 text.
    DateTime(DateTime<FixedOffset>),
    /// Enum case, identified by its declared case name.
    EnumCase(String),
    Array(Vec<ParamValue>),
    /// Shared opaque object; cloning behavior is governed by the parameter's
    /// cloneable flag.
    Object(Arc<dyn ObjectParam>),
}

impl ParamValue {
    /// Human-readable kind tag, used in conversion error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::EnumCase(_) => "enum",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::EnumCase(a), Self::EnumCase(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            // Objects are opaque; equality is identity.
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<DateTime<FixedOffset>> for ParamValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Self::DateTime(v)
    }
}

impl From<Vec<ParamValue>> for ParamValue {
    fn from(v: Vec<ParamValue>) -> Self {
        Self::Array(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
