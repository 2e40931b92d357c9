//! Settings instances - metadata-driven plain data objects
//!
//! A [`SettingsObject`] knows nothing about persistence: it is a bag of
//! parameter values plus lazy slots for embedded settings, shaped entirely by
//! its class metadata. Construction goes through the managing subsystem only;
//! application code receives handles, never builds objects.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::contract::{ParamValue, SettingsError};

use super::metadata::SettingsMetadata;

/// Shared handle to a settings instance.
///
/// Handles are reference-counted so embedded graphs, including circular ones,
/// can point at the same instance from several places.
pub type SettingsHandle = Arc<RwLock<SettingsObject>>;

/// Initializer for a lazy embedded slot
pub type EmbedInit = Arc<dyn Fn() -> Result<SettingsHandle, SettingsError> + Send + Sync>;

/// Lazily initialized embedded settings slot.
///
/// The initializer runs exactly once: the first successful access transitions
/// the slot to `Ready` and every later access returns the same handle. A
/// failed initialization leaves the slot pending.
#[derive(Clone)]
pub enum EmbeddedSlot {
    Pending(EmbedInit),
    Ready(SettingsHandle),
}

impl EmbeddedSlot {
    pub fn is_initialized(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Live settings instance
pub struct SettingsObject {
    class: Arc<SettingsMetadata>,
    values: HashMap<String, ParamValue>,
    embedded: HashMap<String, EmbeddedSlot>,
}

impl SettingsObject {
    /// Create an instance with every parameter at its declared default and
    /// the given embedded slots. Factory use only; there is no public
    /// constructor.
    pub(crate) fn from_defaults(
        class: Arc<SettingsMetadata>,
        embedded: HashMap<String, EmbeddedSlot>,
    ) -> Self {
        let values = class
            .parameters()
            .iter()
            .map(|p| (p.property_name.clone(), p.default.clone()))
            .collect();
        Self {
            class,
            values,
            embedded,
        }
    }

    /// Empty shell used by the cloner; values are filled field by field.
    pub(crate) fn shell(class: Arc<SettingsMetadata>) -> Self {
        Self {
            class,
            values: HashMap::new(),
            embedded: HashMap::new(),
        }
    }

    pub fn class(&self) -> &Arc<SettingsMetadata> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.class_name()
    }

    /// Current value of a parameter, by property name
    pub fn get(&self, property: &str) -> Result<&ParamValue, SettingsError> {
        self.values
            .get(property)
            .ok_or_else(|| SettingsError::UnknownProperty {
                class: self.class_name().to_owned(),
                property: property.to_owned(),
            })
    }

    /// Set a parameter value, by property name.
    ///
    /// The value is stored as-is; converters validate shape and nullability
    /// when the object is persisted or cached.
    pub fn set(
        &mut self,
        property: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), SettingsError> {
        if self.class.parameter_by_property(property).is_none() {
            return Err(SettingsError::UnknownProperty {
                class: self.class_name().to_owned(),
                property: property.to_owned(),
            });
        }
        self.values.insert(property.to_owned(), value.into());
        Ok(())
    }

    /// Access an embedded settings object, initializing its slot on first use
    pub fn embedded(&mut self, property: &str) -> Result<SettingsHandle, SettingsError> {
        let slot = self
            .embedded
            .get(property)
            .cloned()
            .ok_or_else(|| SettingsError::UnknownProperty {
                class: self.class_name().to_owned(),
                property: property.to_owned(),
            })?;
        match slot {
            EmbeddedSlot::Ready(handle) => Ok(handle),
            EmbeddedSlot::Pending(init) => {
                let handle = init()?;
                self.embedded
                    .insert(property.to_owned(), EmbeddedSlot::Ready(handle.clone()));
                Ok(handle)
            }
        }
    }

    /// Whether an embedded slot has been materialized
    pub fn embedded_initialized(&self, property: &str) -> bool {
        self.embedded
            .get(property)
            .is_some_and(EmbeddedSlot::is_initialized)
    }

    /// Snapshot of an embedded slot without initializing it
    pub(crate) fn embedded_slot(&self, property: &str) -> Option<EmbeddedSlot> {
        self.embedded.get(property).cloned()
    }

    pub(crate) fn set_embedded_slot(&mut self, property: &str, slot: EmbeddedSlot) {
        self.embedded.insert(property.to_owned(), slot);
    }
}
