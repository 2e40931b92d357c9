//! Integration tests for versioned migration of stored settings data

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::json;

use settings_engine::domain::{ParameterBuilder, VERSION_KEY};
use settings_engine::{
    EnvVarMode, ParamType, ParamValue, Service, SettingsClassBuilder, StepMigrator, StorageOptions,
    ValueMapper,
};

mod common;
use common::{service, service_with_env};

fn seed_storage(service: &Service, key: &str, data: serde_json::Value) {
    let serde_json::Value::Object(map) = data else {
        panic!("seed data must be a map");
    };
    service
        .storage()
        .get("memory")
        .unwrap()
        .save(key, &map, &StorageOptions::default())
        .unwrap();
}

fn stored_map(service: &Service, key: &str) -> serde_json::Map<String, serde_json::Value> {
    service
        .storage()
        .get("memory")
        .unwrap()
        .load(key, &StorageOptions::default())
        .unwrap()
        .unwrap()
}

#[test]
fn upgrade_imports_env_values_and_persists_the_result() {
    let service = service_with_env(&[("ENV_VALUE2", "true"), ("ENV_VALUE3", "-100.5")]);
    service
        .register_class(|| {
            SettingsClassBuilder::new("MigratedSettings")
                .version(1, "env_import")
                .parameter(ParameterBuilder::new("value1").default("default"))
                .parameter(
                    ParameterBuilder::new("value2")
                        .of_type(ParamType::Bool)
                        .default(ParamValue::Null)
                        .env("bool:ENV_VALUE2", EnvVarMode::Overwrite),
                )
                .parameter(
                    ParameterBuilder::new("value3")
                        .of_type(ParamType::Float)
                        .default(ParamValue::Null)
                        .env_mapped(
                            "float:ENV_VALUE3",
                            EnvVarMode::Overwrite,
                            ValueMapper::Closure(Arc::new(|_| json!(123.4))),
                        ),
                )
                .parameter(
                    ParameterBuilder::new("value4")
                        .of_type(ParamType::String)
                        .default(ParamValue::Null),
                )
        })
        .unwrap();
    service.register_migrator(
        "env_import",
        Arc::new(StepMigrator::new().step(1, |meta, map, helper| {
            let touched = helper.apply_env_overrides(meta, map)?;
            assert_eq!(touched, vec!["ENV_VALUE2".to_owned(), "ENV_VALUE3".to_owned()]);
            Ok(())
        })),
    );

    seed_storage(
        &service,
        "MigratedSettings",
        json!({"value1": "test", "value4": null}),
    );

    // First access triggers the upgrade and writes the result back.
    let settings = service.get("MigratedSettings").unwrap();

    let stored = stored_map(&service, "MigratedSettings");
    assert_eq!(stored["value1"], json!("test"));
    assert_eq!(stored["value2"], json!(true));
    assert_eq!(stored["value3"], json!(123.4));
    assert_eq!(stored["value4"], json!(null));
    assert_eq!(stored[VERSION_KEY], json!(1));

    let guard = settings.read();
    assert_eq!(guard.get("value1").unwrap(), &ParamValue::from("test"));
    assert_eq!(guard.get("value2").unwrap(), &ParamValue::Bool(true));
    assert_eq!(guard.get("value3").unwrap(), &ParamValue::Float(123.4));
    assert_eq!(guard.get("value4").unwrap(), &ParamValue::Null);
}

fn register_renaming_class(service: &Service) {
    service
        .register_class(|| {
            SettingsClassBuilder::new("RenamedSettings")
                .version(3, "renamer")
                .parameter(ParameterBuilder::new("title").default("untitled"))
        })
        .unwrap();
}

#[test]
fn steps_between_stored_and_target_version_run_in_order() {
    let service = service();
    register_renaming_class(&service);

    let order = Arc::new(RwLock::new(Vec::new()));
    let o2 = order.clone();
    let o3 = order.clone();
    service.register_migrator(
        "renamer",
        Arc::new(
            StepMigrator::new()
                .step(1, |_, _, _| panic!("step 1 must not run from version 1"))
                .step(2, move |_, map, _| {
                    o2.write().push(2);
                    // v2 renamed the legacy key.
                    if let Some(value) = map.remove("name") {
                        map.insert("title".to_owned(), value);
                    }
                    Ok(())
                })
                .step(3, move |_, _, _| {
                    o3.write().push(3);
                    Ok(())
                }),
        ),
    );

    seed_storage(
        &service,
        "RenamedSettings",
        json!({"name": "legacy", VERSION_KEY: 1}),
    );

    let settings = service.get("RenamedSettings").unwrap();
    assert_eq!(*order.read(), vec![2, 3]);
    assert_eq!(
        settings.read().get("title").unwrap(),
        &ParamValue::from("legacy")
    );

    let stored = stored_map(&service, "RenamedSettings");
    assert_eq!(stored[VERSION_KEY], json!(3));
    assert!(!stored.contains_key("name"));
}

#[test]
fn unversioned_stored_data_upgrades_from_zero() {
    let service = service();
    register_renaming_class(&service);

    let hits = Arc::new(RwLock::new(Vec::new()));
    let h1 = hits.clone();
    let h2 = hits.clone();
    let h3 = hits.clone();
    let record = move |hits: Arc<RwLock<Vec<u32>>>, v: u32| {
        hits.write().push(v);
    };
    service.register_migrator(
        "renamer",
        Arc::new(
            StepMigrator::new()
                .step(1, move |_, _, _| {
                    record(h1.clone(), 1);
                    Ok(())
                })
                .step(2, move |_, _, _| {
                    record(h2.clone(), 2);
                    Ok(())
                })
                .step(3, move |_, _, _| {
                    record(h3.clone(), 3);
                    Ok(())
                }),
        ),
    );

    seed_storage(&service, "RenamedSettings", json!({"title": "kept"}));

    service.get("RenamedSettings").unwrap();
    assert_eq!(*hits.read(), vec![1, 2, 3]);
}

#[test]
fn missing_step_fails_the_whole_load() {
    let service = service();
    register_renaming_class(&service);
    service.register_migrator(
        "renamer",
        Arc::new(StepMigrator::new().step(1, |_, _, _| Ok(())).step(3, |_, _, _| Ok(()))),
    );

    seed_storage(&service, "RenamedSettings", json!({"title": "x"}));

    assert!(matches!(
        service.get("RenamedSettings"),
        Err(settings_engine::SettingsError::Migration { .. })
    ));
    // Nothing was written back.
    let stored = stored_map(&service, "RenamedSettings");
    assert!(!stored.contains_key(VERSION_KEY));
}

#[test]
fn unregistered_migrator_fails_the_load() {
    let service = service();
    register_renaming_class(&service);
    seed_storage(&service, "RenamedSettings", json!({"title": "x"}));

    assert!(matches!(
        service.get("RenamedSettings"),
        Err(settings_engine::SettingsError::Migration { .. })
    ));
}

#[test]
fn data_already_at_target_version_is_left_alone() {
    let service = service();
    register_renaming_class(&service);
    service.register_migrator(
        "renamer",
        Arc::new(StepMigrator::new().step(1, |_, _, _| {
            panic!("no step may run for up-to-date data")
        })),
    );

    seed_storage(
        &service,
        "RenamedSettings",
        json!({"title": "current", VERSION_KEY: 3}),
    );

    let settings = service.get("RenamedSettings").unwrap();
    assert_eq!(
        settings.read().get("title").unwrap(),
        &ParamValue::from("current")
    );
}
