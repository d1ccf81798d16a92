use json_records::{DataSource, DataSourceOptions, LocalTransport, Model, ModelSchema, Schema};
use proptest::prelude::*;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
enum Op {
    Insert(usize, i64),
    Remove(usize),
    Set(usize, i64),
    Push(usize, i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8usize, -5..5i64).prop_map(|(index, v)| Op::Insert(index, v)),
        (0..8usize).prop_map(Op::Remove),
        (0..8usize, -5..5i64).prop_map(|(index, v)| Op::Set(index, v)),
        (0..8usize, -5..5i64).prop_map(|(index, v)| Op::Push(index, v)),
    ]
}

fn row(id: i64) -> Value {
    json!({"id": id, "g": id % 2, "v": id, "tags": [id]})
}

fn flat_source(len: i64) -> DataSource {
    let rows: Vec<Value> = (1..=len).map(row).collect();
    let mut source = DataSource::new(
        DataSourceOptions::new(),
        Schema::new(ModelSchema::new().with_id("id")),
        LocalTransport::new(Value::Array(rows)),
    );
    source.read().expect("read");
    source
}

fn grouped_source(len: i64) -> DataSource {
    let groups: Vec<Value> = [1, 0]
        .iter()
        .map(|g| {
            let items: Vec<Value> = (1..=len).filter(|id| id % 2 == *g).map(row).collect();
            json!({"field": "g", "value": g, "items": items})
        })
        .collect();
    let mut source = DataSource::new(
        DataSourceOptions::from_json(&json!({"serverGrouping": true, "group": {"field": "g"}}))
            .expect("options"),
        Schema::new(ModelSchema::new().with_id("id")),
        LocalTransport::new(Value::Array(groups)),
    );
    source.read().expect("read");
    source
}

fn pick(source: &DataSource, index: usize) -> Option<Model> {
    let data = source.data();
    if data.is_empty() {
        return None;
    }
    Some(data[index % data.len()].clone())
}

fn apply(source: &mut DataSource, op: &Op) {
    match *op {
        Op::Insert(index, v) => {
            source.insert(index, json!({"g": v.rem_euclid(2), "v": v, "tags": []}));
        }
        Op::Remove(index) => {
            if let Some(model) = pick(source, index) {
                source.remove(&model);
            }
        }
        Op::Set(index, v) => {
            if let Some(model) = pick(source, index) {
                model.set("v", v);
            }
        }
        Op::Push(index, v) => {
            if let Some(model) = pick(source, index) {
                if let Some(tags) = model.get("tags").and_then(|t| t.as_array().cloned()) {
                    tags.push(v);
                }
            }
        }
    }
}

fn snapshot(source: &DataSource) -> Vec<(Model, Value)> {
    source
        .data()
        .iter()
        .map(|model| (model.clone(), model.to_json()))
        .collect()
}

fn assert_restored(source: &DataSource, before: &[(Model, Value)]) {
    let after = snapshot(source);
    assert_eq!(after.len(), before.len());
    for ((model, json), (expected_model, expected_json)) in after.iter().zip(before) {
        assert!(model.ptr_eq(expected_model));
        assert_eq!(json, expected_json);
        assert!(!model.dirty());
    }
    assert!(!source.has_changes());
    source.check_consistency().expect("consistent");
}

proptest! {
    #[test]
    fn cancel_all_is_a_perfect_inverse(len in 0..6i64, ops in prop::collection::vec(op(), 0..24)) {
        let mut source = flat_source(len);
        let before = snapshot(&source);
        for op in &ops {
            apply(&mut source, op);
        }
        source.cancel_changes(None).expect("cancel");
        assert_restored(&source, &before);
    }

    #[test]
    fn cancel_all_restores_server_grouped_tree(len in 0..6i64, ops in prop::collection::vec(op(), 0..24)) {
        let mut source = grouped_source(len);
        let before = snapshot(&source);
        let tree = source.tree().cloned();
        for op in &ops {
            apply(&mut source, op);
            source.check_consistency().expect("consistent after op");
        }
        source.cancel_changes(None).expect("cancel");
        assert_restored(&source, &before);
        prop_assert_eq!(source.tree().cloned(), tree);
    }

    #[test]
    fn removal_never_wraps_other_records(len in 1..8i64, victim in 0..10i64) {
        let mut source = flat_source(len);
        let before: Vec<_> = source.data().iter().map(Model::id).collect();
        let target = Model::with_schema(row(victim), source.records().schema().clone());

        let removed = source.remove(&target);
        let after: Vec<_> = source.data().iter().map(Model::id).collect();

        if (1..=len).contains(&victim) {
            prop_assert!(removed.is_some());
            let expected: Vec<_> = before
                .into_iter()
                .filter(|id| *id != Some(json!(victim)))
                .collect();
            prop_assert_eq!(after, expected);
        } else {
            prop_assert!(removed.is_none());
            prop_assert_eq!(after, before);
        }
    }
}
