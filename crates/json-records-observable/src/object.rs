use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::equal::deep_equal;
use crate::events::{ChangeEvent, ChangeKind, PathStep};
use crate::is_reserved_field;
use crate::listeners::{ListenerId, ListenerMap};
use crate::node::{notify, NodePtr, ParentLink};
use crate::value::ObservableValue;

pub(crate) struct ObjectNode {
    pub(crate) fields: IndexMap<String, ObservableValue>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) listeners: ListenerMap<ChangeEvent>,
}

/// Keyed structure whose assignments are observable.
///
/// Keys keep insertion order. Values under reserved keys are stored as
/// [`ObservableValue::Plain`] and changing them emits nothing.
#[derive(Clone)]
pub struct ObservableObject {
    node: Rc<RefCell<ObjectNode>>,
}

impl Default for ObservableObject {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservableObject {
    pub fn new() -> Self {
        Self {
            node: Rc::new(RefCell::new(ObjectNode {
                fields: IndexMap::new(),
                parent: None,
                listeners: ListenerMap::new(),
            })),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        let object = Self::new();
        object.install(map);
        object
    }

    /// Wraps an object value; any other value yields an empty object.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Self::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<ObservableValue> {
        self.node.borrow().fields.get(key).cloned()
    }

    pub fn get_json(&self, key: &str) -> Option<Value> {
        self.node.borrow().fields.get(key).map(ObservableValue::to_json)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.node.borrow().fields.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.node.borrow().fields.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.node.borrow().fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.borrow().fields.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let node = self.node.borrow();
        let mut map = Map::with_capacity(node.fields.len());
        for (key, value) in &node.fields {
            map.insert(key.clone(), value.to_json());
        }
        Value::Object(map)
    }

    /// Assigns `key`. Returns `false` (and emits nothing) when the current
    /// value is deep-equal to `value`.
    ///
    /// Assigning an existing array or object handle re-parents it under this
    /// object; mutations through it then bubble here. A node has a single
    /// owner: a handle already held under another key of this object is
    /// stored as a fresh copy instead, so each key keeps its own node.
    pub fn set(&self, key: impl Into<String>, value: impl Into<ObservableValue>) -> bool {
        let key = key.into();
        let reserved = is_reserved_field(&key);
        let value = if reserved {
            value.into().into_plain()
        } else {
            value.into()
        };
        if let Some(current) = self.node.borrow().fields.get(&key) {
            if deep_equal(current, &value) {
                return false;
            }
        }

        let value = if !reserved && self.holds_elsewhere(&key, &value) {
            ObservableValue::wrap(value.to_json())
        } else {
            value
        };
        if !reserved {
            self.attach(&key, &value);
        }
        let previous = self
            .node
            .borrow_mut()
            .fields
            .insert(key.clone(), value.clone());
        if let Some(previous) = previous {
            if !previous.same_node(&value) {
                previous.set_parent(None);
            }
        }
        if !reserved {
            self.emit(ChangeKind::Set, key);
        }
        true
    }

    pub fn remove(&self, key: &str) -> Option<ObservableValue> {
        let value = self.node.borrow_mut().fields.shift_remove(key)?;
        value.set_parent(None);
        if !is_reserved_field(key) {
            self.emit(ChangeKind::Remove, key.to_owned());
        }
        Some(value)
    }

    /// Replaces every field with `map` without emitting events.
    ///
    /// This is the bulk path used when committing or restoring a snapshot.
    pub fn replace_all(&self, map: Map<String, Value>) {
        let previous = std::mem::take(&mut self.node.borrow_mut().fields);
        for value in previous.values() {
            value.set_parent(None);
        }
        self.install(map);
    }

    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.node.borrow_mut().listeners.add(listener)
    }

    pub fn off_change(&self, id: ListenerId) -> bool {
        self.node.borrow_mut().listeners.remove(id)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    pub(crate) fn as_ptr(&self) -> NodePtr {
        Rc::as_ptr(&self.node) as NodePtr
    }

    pub(crate) fn set_parent(&self, link: Option<ParentLink>) {
        self.node.borrow_mut().parent = link;
    }

    fn install(&self, map: Map<String, Value>) {
        let mut fields = IndexMap::with_capacity(map.len());
        for (key, value) in map {
            let value = if is_reserved_field(&key) {
                ObservableValue::Plain(value)
            } else {
                let wrapped = ObservableValue::wrap(value);
                self.attach(&key, &wrapped);
                wrapped
            };
            fields.insert(key, value);
        }
        self.node.borrow_mut().fields = fields;
    }

    fn holds_elsewhere(&self, key: &str, value: &ObservableValue) -> bool {
        value.is_observable()
            && self
                .node
                .borrow()
                .fields
                .iter()
                .any(|(other, current)| other != key && current.same_node(value))
    }

    fn attach(&self, key: &str, child: &ObservableValue) {
        child.set_parent(Some(ParentLink::Object {
            node: Rc::downgrade(&self.node),
            key: key.to_owned(),
        }));
    }

    fn emit(&self, kind: ChangeKind, key: String) {
        let (listeners, parent) = {
            let node = self.node.borrow();
            (node.listeners.snapshot(), node.parent.clone())
        };
        notify(
            listeners,
            parent,
            self.as_ptr(),
            ChangeEvent::new(kind, vec![PathStep::Key(key)]),
        );
    }
}

impl fmt::Debug for ObservableObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObservableObject({})", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields_seen(object: &ObservableObject) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        object.on_change(move |event| {
            if let Some(field) = event.field() {
                sink.borrow_mut().push(field.to_owned());
            }
        });
        log
    }

    #[test]
    fn set_emits_once_and_suppresses_equal_values() {
        let object = ObservableObject::from_value(json!({"foo": "bar"}));
        let log = fields_seen(&object);
        assert!(!object.set("foo", "bar"));
        assert!(object.set("foo", "baz"));
        assert_eq!(log.borrow().as_slice(), &["foo".to_string()]);
    }

    #[test]
    fn reserved_keys_stay_plain_and_silent() {
        let object = ObservableObject::from_value(json!({"_meta": {"a": 1}}));
        let log = fields_seen(&object);
        assert!(object.get("_meta").is_some_and(|v| !v.is_observable()));
        assert!(object.set("_meta", json!({"a": 2})));
        assert!(object.get("_meta").is_some_and(|v| !v.is_observable()));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn replace_all_is_silent_and_rewraps() {
        let object = ObservableObject::from_value(json!({"a": 1}));
        let log = fields_seen(&object);
        object.replace_all(json!({"b": {"c": 2}}).as_object().cloned().unwrap_or_default());
        assert!(log.borrow().is_empty());
        assert!(!object.contains_key("a"));
        assert!(object.get("b").is_some_and(|v| v.as_object().is_some()));

        if let Some(ObservableValue::Object(inner)) = object.get("b") {
            inner.set("c", 3);
        }
        assert_eq!(log.borrow().as_slice(), &["b".to_string()]);
    }

    #[test]
    fn handle_shared_between_keys_is_copied() {
        let object = ObservableObject::from_value(json!({"a": [1]}));
        let log = fields_seen(&object);
        let shared = object.get("a").expect("a");
        assert!(object.set("b", shared.clone()));

        let copy = object.get("b").expect("b");
        assert!(!copy.same_node(&shared));
        assert_eq!(copy.to_json(), json!([1]));

        log.borrow_mut().clear();
        shared.as_array().expect("array").push(2);
        copy.as_array().expect("array").push(3);
        assert_eq!(log.borrow().as_slice(), &["a".to_string(), "b".to_string()]);
        assert_eq!(object.to_json(), json!({"a": [1, 2], "b": [1, 3]}));
    }

    #[test]
    fn overwritten_child_is_detached() {
        let object = ObservableObject::from_value(json!({"list": [1]}));
        let old = object.get("list").expect("list");
        let log = fields_seen(&object);
        object.set("list", json!([2]));
        log.borrow_mut().clear();
        old.as_array().expect("array").push(3);
        assert!(log.borrow().is_empty());
    }
}
