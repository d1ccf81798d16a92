use std::fmt;

use serde_json::Value;

use crate::array::ObservableArray;
use crate::equal::deep_equal;
use crate::node::{NodePtr, ParentLink};
use crate::object::ObservableObject;

/// A tracked JSON value.
///
/// `Plain` holds scalars, and also inert objects or arrays stored under
/// reserved keys. `Array` and `Object` are shared handles: cloning an
/// `ObservableValue` clones the handle, not the data.
#[derive(Clone)]
pub enum ObservableValue {
    Plain(Value),
    Array(ObservableArray),
    Object(ObservableObject),
}

impl ObservableValue {
    /// Wraps `value`, recursively turning arrays and objects into observable
    /// nodes.
    pub fn wrap(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Array(ObservableArray::from_values(items)),
            Value::Object(map) => Self::Object(ObservableObject::from_map(map)),
            scalar => Self::Plain(scalar),
        }
    }

    /// Materializes a plain JSON copy.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Plain(value) => value.clone(),
            Self::Array(array) => array.to_json(),
            Self::Object(object) => object.to_json(),
        }
    }

    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            Self::Plain(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ObservableArray> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObservableObject> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_observable(&self) -> bool {
        !matches!(self, Self::Plain(_))
    }

    /// `true` when both values are the same array or object handle.
    pub fn same_node(&self, other: &Self) -> bool {
        match (self.node_ptr(), other.node_ptr()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Strips observability: nested nodes become a detached plain copy.
    pub(crate) fn into_plain(self) -> Self {
        match self {
            Self::Plain(_) => self,
            other => Self::Plain(other.to_json()),
        }
    }

    pub(crate) fn node_ptr(&self) -> Option<NodePtr> {
        match self {
            Self::Plain(_) => None,
            Self::Array(array) => Some(array.as_ptr()),
            Self::Object(object) => Some(object.as_ptr()),
        }
    }

    pub(crate) fn set_parent(&self, link: Option<ParentLink>) {
        match self {
            Self::Plain(_) => {}
            Self::Array(array) => array.set_parent(link),
            Self::Object(object) => object.set_parent(link),
        }
    }
}

impl Default for ObservableValue {
    fn default() -> Self {
        Self::Plain(Value::Null)
    }
}

impl PartialEq for ObservableValue {
    fn eq(&self, other: &Self) -> bool {
        deep_equal(self, other)
    }
}

impl fmt::Debug for ObservableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Self::Array(array) => f.debug_tuple("Array").field(array).finish(),
            Self::Object(object) => f.debug_tuple("Object").field(object).finish(),
        }
    }
}

impl From<Value> for ObservableValue {
    fn from(value: Value) -> Self {
        Self::wrap(value)
    }
}

impl From<ObservableArray> for ObservableValue {
    fn from(array: ObservableArray) -> Self {
        Self::Array(array)
    }
}

impl From<ObservableObject> for ObservableValue {
    fn from(object: ObservableObject) -> Self {
        Self::Object(object)
    }
}

impl From<&str> for ObservableValue {
    fn from(value: &str) -> Self {
        Self::Plain(Value::String(value.to_owned()))
    }
}

impl From<String> for ObservableValue {
    fn from(value: String) -> Self {
        Self::Plain(Value::String(value))
    }
}

impl From<bool> for ObservableValue {
    fn from(value: bool) -> Self {
        Self::Plain(Value::Bool(value))
    }
}

impl From<i32> for ObservableValue {
    fn from(value: i32) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl From<u64> for ObservableValue {
    fn from(value: u64) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl From<i64> for ObservableValue {
    fn from(value: i64) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl From<f64> for ObservableValue {
    fn from(value: f64) -> Self {
        Self::Plain(Value::from(value))
    }
}
