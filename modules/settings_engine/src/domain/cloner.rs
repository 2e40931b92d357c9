//! Cloner - deep copy and merge of settings object graphs
//!
//! Both operations traverse the embedded graph with an identity registry of
//! {class name -> handle} built during the traversal, so circular embeddings
//! terminate and the back-reference inside a cycle points at the same cloned
//! instance as the top-level result. Snapshots are taken under short-lived
//! read guards before recursing; no lock is held across a recursive call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::contract::{ParamValue, SettingsError};

use super::instance::{EmbeddedSlot, SettingsHandle, SettingsObject};
use super::metadata::{ParameterMetadata, SettingsMetadata};

type Snapshot = (
    Arc<SettingsMetadata>,
    Vec<(Arc<ParameterMetadata>, ParamValue)>,
    Vec<(String, EmbeddedSlot)>,
);

#[derive(Default)]
pub struct Cloner;

impl Cloner {
    pub fn new() -> Self {
        Self
    }

    /// Deep copy a settings object graph.
    ///
    /// Object-valued parameters get an independent copy when their metadata
    /// marks them cloneable, otherwise the clone shares the same reference.
    /// Uninitialized lazy embeds stay uninitialized in the clone.
    pub fn clone_settings(&self, source: &SettingsHandle) -> Result<SettingsHandle, SettingsError> {
        let mut registry = HashMap::new();
        self.clone_inner(source, &mut registry)
    }

    /// Copy values from a (typically cloned) source graph back onto a target
    /// graph of the same classes.
    ///
    /// Embeds never materialized in the source are skipped; they cannot hold
    /// diverging data.
    pub fn merge_settings(
        &self,
        source: &SettingsHandle,
        target: &SettingsHandle,
    ) -> Result<(), SettingsError> {
        let mut registry = HashMap::new();
        self.merge_inner(source, target, &mut registry)
    }

    fn snapshot(source: &SettingsHandle) -> Result<Snapshot, SettingsError> {
        let guard = source.read();
        let class = guard.class().clone();
        let mut values = Vec::with_capacity(class.parameters().len());
        for param in class.parameters() {
            values.push((param.clone(), guard.get(&param.property_name)?.clone()));
        }
        let mut slots = Vec::with_capacity(class.embedded().len());
        for embed in class.embedded() {
            if let Some(slot) = guard.embedded_slot(&embed.property_name) {
                slots.push((embed.property_name.clone(), slot));
            }
        }
        Ok((class, values, slots))
    }

    fn clone_inner(
        &self,
        source: &SettingsHandle,
        registry: &mut HashMap<String, SettingsHandle>,
    ) -> Result<SettingsHandle, SettingsError> {
        let (class, values, slots) = Self::snapshot(source)?;
        if let Some(existing) = registry.get(class.class_name()) {
            return Ok(existing.clone());
        }

        let clone: SettingsHandle = Arc::new(RwLock::new(SettingsObject::shell(class.clone())));
        // Registered before recursing, so cycles resolve to this handle.
        registry.insert(class.class_name().to_owned(), clone.clone());

        {
            let mut guard = clone.write();
            for (param, value) in values {
                guard.set(&param.property_name, clone_value(&value, param.cloneable, &param)?)?;
            }
        }
        for (property, slot) in slots {
            let cloned_slot = match slot {
                EmbeddedSlot::Ready(handle) => {
                    EmbeddedSlot::Ready(self.clone_inner(&handle, registry)?)
                }
                pending @ EmbeddedSlot::Pending(_) => pending,
            };
            clone.write().set_embedded_slot(&property, cloned_slot);
        }

        if let Some(hook) = class.post_clone() {
            hook(&mut clone.write());
        }
        Ok(clone)
    }

    fn merge_inner(
        &self,
        source: &SettingsHandle,
        target: &SettingsHandle,
        registry: &mut HashMap<String, SettingsHandle>,
    ) -> Result<(), SettingsError> {
        let (class, values, slots) = Self::snapshot(source)?;
        if registry.contains_key(class.class_name()) {
            return Ok(());
        }
        registry.insert(class.class_name().to_owned(), target.clone());

        {
            let mut guard = target.write();
            if guard.class_name() != class.class_name() {
                return Err(SettingsError::ClassMismatch {
                    expected: class.class_name().to_owned(),
                    actual: guard.class_name().to_owned(),
                });
            }
            for (param, value) in values {
                guard.set(&param.property_name, clone_value(&value, param.cloneable, &param)?)?;
            }
        }
        for (property, slot) in slots {
            if let EmbeddedSlot::Ready(source_embed) = slot {
                let target_embed = target.write().embedded(&property)?;
                self.merge_inner(&source_embed, &target_embed, registry)?;
            }
        }

        if let Some(hook) = class.post_merge() {
            hook(&mut target.write());
        }
        Ok(())
    }
}

/// Copy one parameter value.
///
/// Arrays recurse element-wise under the owning parameter's cloneable flag.
/// A cloneable object parameter whose runtime value refuses cloning is a
/// fatal error, never a silent shallow copy.
fn clone_value(
    value: &ParamValue,
    cloneable: bool,
    param: &ParameterMetadata,
) -> Result<ParamValue, SettingsError> {
    match value {
        ParamValue::Object(object) => {
            if !cloneable {
                return Ok(value.clone());
            }
            object
                .try_clone_object()
                .map(ParamValue::Object)
                .ok_or_else(|| SettingsError::NotCloneable {
                    parameter: format!("{}::{}", param.class, param.property_name),
                })
        }
        ParamValue::Array(items) => items
            .iter()
            .map(|item| clone_value(item, cloneable, param))
            .collect::<Result<Vec<_>, _>>()
            .map(ParamValue::Array),
        other => Ok(other.clone()),
    }
}
