//! Aggregate-function registry.
//!
//! Grouping only needs two things from an aggregate: its zero value, used to
//! seed a freshly wrapped group, and its fold (`step` then `finish`), used when
//! groups are computed locally.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde_json::{Number, Value};

use crate::group::{AggregateDescriptor, GroupAggregates};
use crate::model::Model;

pub trait AggregateFunction {
    fn zero(&self) -> Value;

    fn step(&self, acc: Value, value: &Value) -> Value;

    fn finish(&self, acc: Value, _count: usize) -> Value {
        acc
    }
}

struct Count;
struct Sum;
struct Average;
struct Min;
struct Max;

impl AggregateFunction for Count {
    fn zero(&self) -> Value {
        Value::from(0)
    }

    fn step(&self, acc: Value, _value: &Value) -> Value {
        Value::from(acc.as_u64().unwrap_or(0) + 1)
    }
}

impl AggregateFunction for Sum {
    fn zero(&self) -> Value {
        Value::from(0)
    }

    fn step(&self, acc: Value, value: &Value) -> Value {
        add_numbers(&acc, value).unwrap_or(acc)
    }
}

impl AggregateFunction for Average {
    fn zero(&self) -> Value {
        Value::from(0)
    }

    fn step(&self, acc: Value, value: &Value) -> Value {
        add_numbers(&acc, value).unwrap_or(acc)
    }

    fn finish(&self, acc: Value, count: usize) -> Value {
        match (acc.as_f64(), count) {
            (Some(sum), n) if n > 0 => Number::from_f64(sum / n as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => acc,
        }
    }
}

impl AggregateFunction for Min {
    fn zero(&self) -> Value {
        Value::Null
    }

    fn step(&self, acc: Value, value: &Value) -> Value {
        pick(acc, value, Ordering::Less)
    }
}

impl AggregateFunction for Max {
    fn zero(&self) -> Value {
        Value::Null
    }

    fn step(&self, acc: Value, value: &Value) -> Value {
        pick(acc, value, Ordering::Greater)
    }
}

fn add_numbers(a: &Value, b: &Value) -> Option<Value> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(Value::from(sum));
        }
    }
    let sum = a.as_f64()? + b.as_f64()?;
    Number::from_f64(sum).map(Value::Number)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn pick(acc: Value, value: &Value, wanted: Ordering) -> Value {
    if value.is_null() {
        return acc;
    }
    if acc.is_null() {
        return value.clone();
    }
    match compare(value, &acc) {
        Some(ordering) if ordering == wanted => value.clone(),
        _ => acc,
    }
}

/// Named aggregate functions.
pub struct AggregateRegistry {
    functions: BTreeMap<String, Box<dyn AggregateFunction>>,
}

impl Default for AggregateRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl AggregateRegistry {
    pub fn empty() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    /// `count`, `sum`, `average`, `min` and `max`.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("count", Count);
        registry.register("sum", Sum);
        registry.register("average", Average);
        registry.register("min", Min);
        registry.register("max", Max);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, function: impl AggregateFunction + 'static) {
        self.functions.insert(name.into(), Box::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&dyn AggregateFunction> {
        self.functions.get(name).map(|function| function.as_ref())
    }

    /// Zero value for `kind`; unknown kinds seed as null.
    pub fn zero(&self, kind: &str) -> Value {
        self.get(kind).map_or(Value::Null, |function| function.zero())
    }

    /// Aggregates for an empty group: every declared aggregate at its zero.
    pub fn seed(&self, descriptors: &[AggregateDescriptor]) -> GroupAggregates {
        let mut result = GroupAggregates::new();
        for descriptor in descriptors {
            result
                .entry(descriptor.field.clone())
                .or_insert_with(IndexMap::new)
                .insert(descriptor.aggregate.clone(), self.zero(&descriptor.aggregate));
        }
        result
    }

    /// Folds every declared aggregate over `records`. Unknown kinds are
    /// skipped.
    pub fn compute(&self, descriptors: &[AggregateDescriptor], records: &[Model]) -> GroupAggregates {
        let mut result = GroupAggregates::new();
        for descriptor in descriptors {
            let Some(function) = self.get(&descriptor.aggregate) else {
                tracing::debug!(kind = %descriptor.aggregate, "unknown aggregate skipped");
                continue;
            };
            let mut acc = function.zero();
            for record in records {
                let value = record.get_json(&descriptor.field).unwrap_or(Value::Null);
                acc = function.step(acc, &value);
            }
            result
                .entry(descriptor.field.clone())
                .or_insert_with(IndexMap::new)
                .insert(descriptor.aggregate.clone(), function.finish(acc, records.len()));
        }
        result
    }
}

impl fmt::Debug for AggregateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.functions.keys()).finish()
    }
}
