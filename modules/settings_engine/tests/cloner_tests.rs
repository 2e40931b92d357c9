//! Integration tests for clone/merge of settings graphs, including circular
//! embeddings

use std::sync::Arc;

use settings_engine::ParamValue;

mod common;
use common::{register_circular_pair, service};

#[test]
fn embedded_back_reference_resolves_to_the_shared_instance() {
    let service = service();
    register_circular_pair(&service);

    let parent = service.get("ParentSettings").unwrap();
    let child = parent.write().embedded("child").unwrap();
    let back = child.write().embedded("parent").unwrap();
    assert!(Arc::ptr_eq(&parent, &back));
}

#[test]
fn circular_clone_preserves_referential_identity() {
    let service = service();
    register_circular_pair(&service);

    // Materialize the whole cycle before cloning.
    let parent = service.get("ParentSettings").unwrap();
    let child = parent.write().embedded("child").unwrap();
    child.write().embedded("parent").unwrap();

    let copy = service.create_temporary_copy("ParentSettings").unwrap();
    assert!(!Arc::ptr_eq(&parent, &copy));

    let copy_child = copy.write().embedded("child").unwrap();
    assert!(!Arc::ptr_eq(&child, &copy_child));

    // The back-reference inside the cloned cycle points at the cloned
    // parent, not at the live one.
    let copy_back = copy_child.write().embedded("parent").unwrap();
    assert!(Arc::ptr_eq(&copy, &copy_back));
}

#[test]
fn clone_edits_stay_on_the_copy_until_merged() {
    let service = service();
    register_circular_pair(&service);

    let live = service.get("ParentSettings").unwrap();
    let copy = service.create_temporary_copy("ParentSettings").unwrap();
    copy.write().set("name", "edited").unwrap();

    assert_eq!(
        live.read().get("name").unwrap(),
        &ParamValue::from("parent")
    );

    service.merge_temporary_copy(&copy).unwrap();
    assert_eq!(
        live.read().get("name").unwrap(),
        &ParamValue::from("edited")
    );
}

#[test]
fn merging_a_circular_copy_terminates_and_updates_both_sides() {
    let service = service();
    register_circular_pair(&service);

    let parent = service.get("ParentSettings").unwrap();
    let child = parent.write().embedded("child").unwrap();
    child.write().embedded("parent").unwrap();

    let copy = service.create_temporary_copy("ParentSettings").unwrap();
    copy.write().set("name", "parent v2").unwrap();
    let copy_child = copy.write().embedded("child").unwrap();
    copy_child.write().set("name", "child v2").unwrap();

    service.merge_temporary_copy(&copy).unwrap();

    assert_eq!(
        parent.read().get("name").unwrap(),
        &ParamValue::from("parent v2")
    );
    assert_eq!(
        child.read().get("name").unwrap(),
        &ParamValue::from("child v2")
    );
}

#[test]
fn untouched_lazy_embeds_are_skipped_on_merge() {
    let service = service();
    register_circular_pair(&service);

    // Copy without ever materializing the child.
    let copy = service.create_temporary_copy("ParentSettings").unwrap();
    assert!(!copy.read().embedded_initialized("child"));
    copy.write().set("name", "solo edit").unwrap();

    service.merge_temporary_copy(&copy).unwrap();

    let live = service.get("ParentSettings").unwrap();
    assert_eq!(
        live.read().get("name").unwrap(),
        &ParamValue::from("solo edit")
    );
    // Merge never forced the live child into existence.
    assert!(!live.read().embedded_initialized("child"));
}
