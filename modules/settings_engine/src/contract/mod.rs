//! Public contract for the settings engine
//!
//! Transport-agnostic value model and error taxonomy. Everything the rest of
//! the crate persists, caches or converts is expressed in these terms.

pub mod error;
pub mod model;

pub use error::SettingsError;
pub use model::{NormalizedMap, ObjectCodec, ObjectParam, ParamType, ParamValue};
