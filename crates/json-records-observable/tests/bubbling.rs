use std::cell::RefCell;
use std::rc::Rc;

use json_records_observable::{
    ChangeEvent, ChangeKind, ObservableArray, ObservableObject, ObservableValue, PathStep,
};
use proptest::prelude::*;
use serde_json::json;

fn record_events(object: &ObservableObject) -> Rc<RefCell<Vec<ChangeEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    object.on_change(move |event| sink.borrow_mut().push(event.clone()));
    log
}

fn nested_array(root: &ObservableObject) -> ObservableArray {
    let outer = root.get("outer").expect("outer");
    let list = outer.as_object().expect("object").get("list").expect("list");
    list.as_array().expect("array").clone()
}

#[test]
fn deep_mutation_is_attributed_to_top_level_field() {
    let root = ObservableObject::from_value(json!({
        "name": "x",
        "outer": {"list": [{"v": 1}, {"v": 2}]}
    }));
    let log = record_events(&root);

    let list = nested_array(&root);
    let second = list.get(1).expect("item");
    second.as_object().expect("object").set("v", 3);

    let events = log.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].field(), Some("outer"));
    assert_eq!(
        events[0].path,
        vec![
            PathStep::Key("outer".into()),
            PathStep::Key("list".into()),
            PathStep::Index(1),
            PathStep::Key("v".into()),
        ]
    );
    assert_eq!(root.to_json()["outer"]["list"][1]["v"], json!(3));
}

#[test]
fn path_index_tracks_current_position_after_shifts() {
    let root = ObservableObject::from_value(json!({"list": [{"v": 1}, {"v": 2}]}));
    let list = root.get("list").expect("list").as_array().cloned().expect("array");
    let tracked = list.get(1).expect("item");
    list.insert(0, json!({"v": 0}));

    let log = record_events(&root);
    tracked.as_object().expect("object").set("v", 5);
    assert_eq!(log.borrow()[0].path[1], PathStep::Index(2));
}

#[test]
fn reassigned_node_bubbles_only_to_new_owner() {
    let first = ObservableObject::from_value(json!({"a": [1]}));
    let second = ObservableObject::new();
    let shared = first.get("a").expect("a");
    assert!(second.set("b", shared.clone()));

    let first_log = record_events(&first);
    let second_log = record_events(&second);
    shared.as_array().expect("array").push(2);

    assert!(first_log.borrow().is_empty());
    assert_eq!(second_log.borrow()[0].field(), Some("b"));
    assert_eq!(second_log.borrow()[0].kind, ChangeKind::Add);
}

#[test]
fn wrapping_is_idempotent() {
    let root = ObservableObject::new();
    let array = ObservableArray::new();
    root.set("items", array.clone());
    let stored = root.get("items").expect("items");
    assert!(stored.same_node(&ObservableValue::from(array.clone())));
    assert!(!root.set("items", array));
}

#[test]
fn reserved_nested_data_is_inert() {
    let root = ObservableObject::from_value(json!({"_cache": {"list": [1]}}));
    let log = record_events(&root);
    let cache = root.get("_cache").expect("cache");
    assert!(cache.as_plain().is_some());
    assert!(log.borrow().is_empty());
}

proptest! {
    #[test]
    fn every_array_mutation_reports_owning_field(ops in proptest::collection::vec(0u8..4, 1..24)) {
        let root = ObservableObject::from_value(json!({"keep": 1, "bag": {"items": []}}));
        let log = record_events(&root);
        let items = root
            .get("bag")
            .and_then(|bag| bag.as_object().and_then(|o| o.get("items")))
            .and_then(|items| items.as_array().cloned())
            .expect("items array");

        let mut expected = 0usize;
        for (step, op) in ops.iter().enumerate() {
            match op {
                0 => { items.push(step as i64); expected += 1; }
                1 => { if items.pop().is_some() { expected += 1; } }
                2 => { items.insert(0, json!({"n": step})); expected += 1; }
                _ => { if items.set(0, json!(step)) { expected += 1; } }
            }
        }

        let events = log.borrow();
        prop_assert_eq!(events.len(), expected);
        prop_assert!(events.iter().all(|event| event.field() == Some("bag")));
    }
}
