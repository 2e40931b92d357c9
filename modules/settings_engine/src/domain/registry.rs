//! Metadata manager - class registry, metadata cache, cascade resolution
//!
//! Classes are declared as manifest closures producing a
//! `SettingsClassBuilder`. Registration builds the metadata immediately, so
//! structural mistakes surface at wiring time instead of on the first real
//! request. Built metadata is cached for the process lifetime; in debug mode
//! every lookup rebuilds from the manifest so declaration edits take effect
//! without a restart.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::contract::SettingsError;

use super::metadata::{SettingsClassBuilder, SettingsMetadata};

/// Closure producing a class declaration from scratch
pub type ClassManifest = Arc<dyn Fn() -> SettingsClassBuilder + Send + Sync>;

pub struct MetadataRegistry {
    default_storage_adapter: String,
    debug: bool,
    manifests: RwLock<HashMap<String, ClassManifest>>,
    cache: RwLock<HashMap<String, Arc<SettingsMetadata>>>,
}

impl MetadataRegistry {
    pub fn new(config: &Config) -> Self {
        Self {
            default_storage_adapter: config.default_storage_adapter.clone(),
            debug: config.debug,
            manifests: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Register a settings class.
    ///
    /// The manifest is invoked once right away; a declaration that does not
    /// build fails registration. Registering the same class twice is a
    /// structural error.
    pub fn register<F>(&self, manifest: F) -> Result<Arc<SettingsMetadata>, SettingsError>
    where
        F: Fn() -> SettingsClassBuilder + Send + Sync + 'static,
    {
        let built = manifest().build(&self.default_storage_adapter)?;
        let class = built.class_name().to_owned();

        let mut manifests = self.manifests.write();
        if manifests.contains_key(&class) {
            return Err(SettingsError::InvalidClass {
                class,
                details: "class is already registered".to_owned(),
            });
        }
        let metadata = Arc::new(built);
        manifests.insert(class.clone(), Arc::new(manifest));
        self.cache.write().insert(class.clone(), metadata.clone());
        tracing::debug!(class = %class, "settings class registered");
        Ok(metadata)
    }

    pub fn is_settings_class(&self, class: &str) -> bool {
        self.manifests.read().contains_key(class)
    }

    /// Registered class names, sorted for deterministic iteration
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.manifests.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn get_settings_metadata(
        &self,
        class: &str,
    ) -> Result<Arc<SettingsMetadata>, SettingsError> {
        if self.debug {
            // Rebuild from the manifest so edited declarations are picked up.
            let manifest = self
                .manifests
                .read()
                .get(class)
                .cloned()
                .ok_or_else(|| SettingsError::UnknownClass(class.to_owned()))?;
            let metadata = Arc::new(manifest().build(&self.default_storage_adapter)?);
            self.cache
                .write()
                .insert(class.to_owned(), metadata.clone());
            return Ok(metadata);
        }
        self.cache
            .read()
            .get(class)
            .cloned()
            .ok_or_else(|| SettingsError::UnknownClass(class.to_owned()))
    }

    /// Transitive closure of classes reachable via embedding, root included.
    ///
    /// Depth-first, with a visited set seeded with the root so circular
    /// embeddings (including a class embedding itself) terminate.
    pub fn resolve_embedded_cascade(&self, class: &str) -> Result<Vec<String>, SettingsError> {
        let mut visited = HashSet::new();
        let mut ordered = Vec::new();
        let mut stack = vec![class.to_owned()];
        visited.insert(class.to_owned());

        while let Some(current) = stack.pop() {
            let metadata = self.get_settings_metadata(&current)?;
            ordered.push(current);
            // Reverse keeps declaration order in the depth-first result.
            for embed in metadata.embedded().iter().rev() {
                if visited.insert(embed.target_class.clone()) {
                    stack.push(embed.target_class.clone());
                }
            }
        }
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metadata::{EmbeddedBuilder, ParameterBuilder};

    fn registry() -> MetadataRegistry {
        MetadataRegistry::new(&Config::default())
    }

    #[test]
    fn registration_builds_eagerly() {
        let registry = registry();
        let result = registry.register(|| {
            SettingsClassBuilder::new("Broken").parameter(ParameterBuilder::new("mystery"))
        });
        assert!(matches!(result, Err(SettingsError::InvalidClass { .. })));
        assert!(!registry.is_settings_class("Broken"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = registry();
        registry
            .register(|| SettingsClassBuilder::new("App"))
            .unwrap();
        let result = registry.register(|| SettingsClassBuilder::new("App"));
        assert!(matches!(result, Err(SettingsError::InvalidClass { .. })));
    }

    #[test]
    fn lookup_of_unknown_class_fails() {
        let registry = registry();
        assert!(matches!(
            registry.get_settings_metadata("Nope"),
            Err(SettingsError::UnknownClass(_))
        ));
        assert!(!registry.is_settings_class("Nope"));
    }

    #[test]
    fn metadata_is_cached_outside_debug() {
        let registry = registry();
        registry
            .register(|| {
                SettingsClassBuilder::new("App").parameter(ParameterBuilder::new("flag").default(true))
            })
            .unwrap();
        let first = registry.get_settings_metadata("App").unwrap();
        let second = registry.get_settings_metadata("App").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn debug_mode_rebuilds_per_lookup() {
        let registry = MetadataRegistry::new(&Config {
            debug: true,
            ..Config::default()
        });
        registry
            .register(|| SettingsClassBuilder::new("App"))
            .unwrap();
        let first = registry.get_settings_metadata("App").unwrap();
        let second = registry.get_settings_metadata("App").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn cascade_covers_circular_graphs() {
        let registry = registry();
        registry
            .register(|| {
                SettingsClassBuilder::new("A").embed(EmbeddedBuilder::new("b").target("B"))
            })
            .unwrap();
        registry
            .register(|| {
                SettingsClassBuilder::new("B").embed(EmbeddedBuilder::new("a").target("A"))
            })
            .unwrap();

        let cascade = registry.resolve_embedded_cascade("A").unwrap();
        assert_eq!(cascade, vec!["A".to_owned(), "B".to_owned()]);
    }

    #[test]
    fn self_embedding_terminates() {
        let registry = registry();
        registry
            .register(|| {
                SettingsClassBuilder::new("Looper")
                    .embed(EmbeddedBuilder::new("inner").target("Looper"))
            })
            .unwrap();
        let cascade = registry.resolve_embedded_cascade("Looper").unwrap();
        assert_eq!(cascade, vec!["Looper".to_owned()]);
    }
}
