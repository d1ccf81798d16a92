//! Change-tracked records.
//!
//! A [`Model`] wraps its fields in an [`ObservableObject`] and listens on it:
//! any assignment, including one made deep inside a nested array or object,
//! marks the owning top-level field dirty. Each model also keeps a pristine
//! JSON snapshot of its fields, taken at construction and refreshed by
//! [`Model::accept`], which [`Model::revert`] restores.

mod schema;

pub use schema::{FieldSpec, ModelSchema};

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use json_records_observable::{
    is_reserved_field, ChangeEvent, ListenerId, ObservableObject, ObservableValue,
};
use serde_json::{Map, Value};

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct EditState {
    dirty_fields: BTreeSet<String>,
    pristine: Map<String, Value>,
}

struct ModelInner {
    uid: u64,
    schema: Rc<ModelSchema>,
    fields: ObservableObject,
    state: Rc<RefCell<EditState>>,
}

/// Shared handle to a record. Clones refer to the same record; equality is
/// handle identity.
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

/// Non-owning handle, used by listeners that must not keep a record alive.
#[derive(Clone)]
pub struct WeakModel {
    inner: Weak<ModelInner>,
}

impl WeakModel {
    pub fn upgrade(&self) -> Option<Model> {
        self.inner.upgrade().map(|inner| Model { inner })
    }
}

impl Model {
    /// Builds a record without an identity field; it is always new.
    pub fn new(values: Value) -> Self {
        Self::with_schema(values, Rc::new(ModelSchema::default()))
    }

    pub fn with_schema(values: Value, schema: Rc<ModelSchema>) -> Self {
        let mut map = match values {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        schema.apply_defaults(&mut map);

        let state = Rc::new(RefCell::new(EditState {
            dirty_fields: BTreeSet::new(),
            pristine: map.clone(),
        }));
        let fields = ObservableObject::from_map(map);
        let tracker = Rc::clone(&state);
        fields.on_change(move |event| {
            if let Some(field) = event.field() {
                if !is_reserved_field(field) {
                    tracker.borrow_mut().dirty_fields.insert(field.to_owned());
                }
            }
        });

        Self {
            inner: Rc::new(ModelInner {
                uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
                schema,
                fields,
                state,
            }),
        }
    }

    /// Process-unique handle id.
    pub fn uid(&self) -> u64 {
        self.inner.uid
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.inner.schema
    }

    /// Identity value, or `None` when no identity field is configured or the
    /// value is absent or null.
    pub fn id(&self) -> Option<Value> {
        let field = self.inner.schema.id_field()?;
        self.inner
            .fields
            .get_json(field)
            .filter(|value| !value.is_null())
    }

    /// `true` until the record carries a non-default identity value.
    pub fn is_new(&self) -> bool {
        match self.id() {
            None => true,
            Some(id) => self.inner.schema.default_id() == Some(&id),
        }
    }

    pub fn get(&self, field: &str) -> Option<ObservableValue> {
        self.inner.fields.get(field)
    }

    pub fn get_json(&self, field: &str) -> Option<Value> {
        self.inner.fields.get_json(field)
    }

    /// The observable field container; mutations made through it are tracked.
    pub fn fields(&self) -> &ObservableObject {
        &self.inner.fields
    }

    pub fn editable(&self, field: &str) -> bool {
        self.inner.schema.is_editable(field)
    }

    /// Assigns `field` and marks it dirty.
    ///
    /// Returns `false` without touching dirty state when the field is not
    /// editable or already holds a deep-equal value.
    pub fn set(&self, field: &str, value: impl Into<ObservableValue>) -> bool {
        if !self.editable(field) {
            return false;
        }
        self.inner.fields.set(field, value)
    }

    pub fn dirty(&self) -> bool {
        !self.inner.state.borrow().dirty_fields.is_empty()
    }

    pub fn dirty_fields(&self) -> BTreeSet<String> {
        self.inner.state.borrow().dirty_fields.clone()
    }

    pub fn is_dirty_field(&self, field: &str) -> bool {
        self.inner.state.borrow().dirty_fields.contains(field)
    }

    /// Commits `values`: replaces every field verbatim, clears dirty state and
    /// makes `values` the new pristine snapshot.
    pub fn accept(&self, values: Value) {
        let map = match values {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.inner.fields.replace_all(map.clone());
        let mut state = self.inner.state.borrow_mut();
        state.dirty_fields.clear();
        state.pristine = map;
    }

    /// Restores every field from the pristine snapshot and clears dirty state.
    pub fn revert(&self) {
        let pristine = self.inner.state.borrow().pristine.clone();
        self.inner.fields.replace_all(pristine);
        self.inner.state.borrow_mut().dirty_fields.clear();
    }

    pub fn pristine(&self) -> Value {
        Value::Object(self.inner.state.borrow().pristine.clone())
    }

    pub fn to_json(&self) -> Value {
        self.inner.fields.to_json()
    }

    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.inner.fields.on_change(listener)
    }

    pub fn off_change(&self, id: ListenerId) -> bool {
        self.inner.fields.off_change(id)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakModel {
        WeakModel {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Same handle, or both carry the same identity value.
    pub(crate) fn same_record(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("uid", &self.inner.uid)
            .field("fields", &self.to_json())
            .field("dirty_fields", &self.inner.state.borrow().dirty_fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_id(values: Value) -> Model {
        Model::with_schema(values, Rc::new(ModelSchema::new().with_id("id")))
    }

    #[test]
    fn new_record_without_identity_is_new() {
        assert!(Model::new(json!({"foo": "bar"})).is_new());
        assert!(with_id(json!({"foo": "bar"})).is_new());
        assert!(!with_id(json!({"id": 1})).is_new());
    }

    #[test]
    fn default_identity_counts_as_new() {
        let schema = ModelSchema::new()
            .with_id("id")
            .with_field("id", FieldSpec::new().default_value(json!(0)));
        let model = Model::with_schema(json!({}), Rc::new(schema));
        assert_eq!(model.get_json("id"), Some(json!(0)));
        assert!(model.is_new());
    }

    #[test]
    fn set_marks_field_dirty_only_on_change() {
        let model = with_id(json!({"id": 1, "foo": "foo"}));
        assert!(!model.set("foo", "foo"));
        assert!(!model.dirty());
        assert!(model.set("foo", "bar"));
        assert!(model.dirty());
        assert_eq!(model.dirty_fields(), BTreeSet::from(["foo".to_string()]));
    }

    #[test]
    fn read_only_field_rejects_set() {
        let schema = ModelSchema::new().with_field("locked", FieldSpec::new().read_only());
        let model = Model::with_schema(json!({"locked": 1}), Rc::new(schema));
        assert!(!model.set("locked", 2));
        assert_eq!(model.get_json("locked"), Some(json!(1)));
        assert!(!model.dirty());
    }

    #[test]
    fn nested_object_mutation_dirties_owner() {
        let model = Model::new(json!({"address": {"city": "a"}}));
        let address = model.get("address").expect("address");
        address.as_object().expect("object").set("city", "b");
        assert!(model.is_dirty_field("address"));
    }

    #[test]
    fn revert_restores_snapshot_and_rewraps() {
        let model = with_id(json!({"id": 1, "foo": {"bar": "baz"}}));
        model.set("foo", json!({"bar": "moo"}));
        model.revert();
        assert!(!model.dirty());
        let foo = model.get("foo").expect("foo");
        assert!(foo.as_object().is_some());
        assert_eq!(foo.to_json(), json!({"bar": "baz"}));

        foo.as_object().expect("object").set("bar", "x");
        assert!(model.is_dirty_field("foo"));
    }

    #[test]
    fn accept_refreshes_snapshot() {
        let model = Model::new(json!({"foo": "bar"}));
        model.set("foo", "baz");
        model.accept(json!({"foo": "bar2"}));
        assert!(!model.dirty());
        assert_eq!(model.pristine(), json!({"foo": "bar2"}));
        model.set("foo", "x");
        model.revert();
        assert_eq!(model.get_json("foo"), Some(json!("bar2")));
    }

    #[test]
    fn same_record_matches_identity_or_handle() {
        let a = with_id(json!({"id": 1}));
        let b = with_id(json!({"id": 1}));
        let c = Model::new(json!({}));
        assert!(a.same_record(&b));
        assert!(!c.same_record(&Model::new(json!({}))));
        assert!(c.same_record(&c.clone()));
    }
}
