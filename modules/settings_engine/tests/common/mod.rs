//! Common test fixtures: env sources, shared services and settings classes
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use settings_engine::domain::{EnvVarResolver, ParameterBuilder};
use settings_engine::{
    Config, EmbeddedBuilder, ParamType, ParamValue, Service, SettingsClassBuilder,
};

/// Env resolver backed by a fixed map instead of the process environment
pub fn env_source(vars: &[(&str, &str)]) -> Arc<EnvVarResolver> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    Arc::new(EnvVarResolver::with_source(Arc::new(move |name: &str| {
        map.get(name).cloned()
    })))
}

pub fn service_with_env(vars: &[(&str, &str)]) -> Arc<Service> {
    Service::with_env(Config::default(), env_source(vars))
}

pub fn service() -> Arc<Service> {
    service_with_env(&[])
}

/// Point `to`'s memory adapter at `from`'s, so a second service sees the
/// first one's persisted data, like a fresh process sharing a database.
pub fn share_memory_storage(from: &Service, to: &Service) {
    let adapter = from.storage().get("memory").unwrap();
    to.storage().register("memory", adapter);
}

/// The classic three-parameter fixture class:
/// `value1: string = "default"`, `value2: int? = null`, `value3: bool = false`
pub fn register_website_settings(service: &Service) {
    service
        .register_class(|| {
            SettingsClassBuilder::new("WebsiteSettings")
                .parameter(ParameterBuilder::new("value1").default("default"))
                .parameter(
                    ParameterBuilder::new("value2")
                        .of_type(ParamType::Int)
                        .default(ParamValue::Null),
                )
                .parameter(ParameterBuilder::new("value3").default(false))
        })
        .unwrap();
}

/// Circular pair: each side embeds the other
pub fn register_circular_pair(service: &Service) {
    service
        .register_class(|| {
            SettingsClassBuilder::new("ParentSettings")
                .parameter(ParameterBuilder::new("name").default("parent"))
                .embed(EmbeddedBuilder::new("child").target("ChildSettings"))
        })
        .unwrap();
    service
        .register_class(|| {
            SettingsClassBuilder::new("ChildSettings")
                .parameter(ParameterBuilder::new("name").default("child"))
                .embed(EmbeddedBuilder::new("parent").target("ParentSettings"))
        })
        .unwrap();
}
