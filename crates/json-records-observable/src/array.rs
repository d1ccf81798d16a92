use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::equal::deep_equal;
use crate::events::{ChangeEvent, ChangeKind, PathStep};
use crate::listeners::{ListenerId, ListenerMap};
use crate::node::{notify, NodePtr, ParentLink};
use crate::value::ObservableValue;

pub(crate) struct ArrayNode {
    pub(crate) items: Vec<ObservableValue>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) listeners: ListenerMap<ChangeEvent>,
}

/// Ordered sequence whose element additions, removals and assignments are
/// observable. Elements that are arrays or objects are wrapped as well.
#[derive(Clone)]
pub struct ObservableArray {
    node: Rc<RefCell<ArrayNode>>,
}

impl Default for ObservableArray {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservableArray {
    pub fn new() -> Self {
        Self {
            node: Rc::new(RefCell::new(ArrayNode {
                items: Vec::new(),
                parent: None,
                listeners: ListenerMap::new(),
            })),
        }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        let array = Self::new();
        let items: Vec<ObservableValue> = values.into_iter().map(ObservableValue::wrap).collect();
        for item in &items {
            array.attach(item);
        }
        array.node.borrow_mut().items = items;
        array
    }

    pub fn len(&self) -> usize {
        self.node.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.borrow().items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ObservableValue> {
        self.node.borrow().items.get(index).cloned()
    }

    /// Snapshot of the current elements (nested nodes are shared handles).
    pub fn to_vec(&self) -> Vec<ObservableValue> {
        self.node.borrow().items.clone()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(
            self.node
                .borrow()
                .items
                .iter()
                .map(ObservableValue::to_json)
                .collect(),
        )
    }

    /// Appends `value` and returns the new length.
    pub fn push(&self, value: impl Into<ObservableValue>) -> usize {
        let value = value.into();
        self.attach(&value);
        let index = {
            let mut node = self.node.borrow_mut();
            node.items.push(value);
            node.items.len() - 1
        };
        self.emit(ChangeKind::Add, index);
        index + 1
    }

    pub fn pop(&self) -> Option<ObservableValue> {
        let (value, index) = {
            let mut node = self.node.borrow_mut();
            let value = node.items.pop()?;
            let index = node.items.len();
            (value, index)
        };
        value.set_parent(None);
        self.emit(ChangeKind::Remove, index);
        Some(value)
    }

    /// Inserts `value` at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, value: impl Into<ObservableValue>) {
        let value = value.into();
        self.attach(&value);
        let index = {
            let mut node = self.node.borrow_mut();
            let index = index.min(node.items.len());
            node.items.insert(index, value);
            index
        };
        self.emit(ChangeKind::Add, index);
    }

    pub fn remove(&self, index: usize) -> Option<ObservableValue> {
        let value = {
            let mut node = self.node.borrow_mut();
            if index >= node.items.len() {
                return None;
            }
            node.items.remove(index)
        };
        value.set_parent(None);
        self.emit(ChangeKind::Remove, index);
        Some(value)
    }

    /// Removes `delete_count` elements starting at `start` and inserts `items`
    /// in their place. Returns the removed elements.
    pub fn splice<I, V>(&self, start: usize, delete_count: usize, items: I) -> Vec<ObservableValue>
    where
        I: IntoIterator<Item = V>,
        V: Into<ObservableValue>,
    {
        let inserted: Vec<ObservableValue> = items.into_iter().map(Into::into).collect();
        for item in &inserted {
            self.attach(item);
        }
        let (start, removed, added) = {
            let mut node = self.node.borrow_mut();
            let start = start.min(node.items.len());
            let end = start.saturating_add(delete_count).min(node.items.len());
            let added = inserted.len();
            let removed: Vec<ObservableValue> = node.items.splice(start..end, inserted).collect();
            (start, removed, added)
        };
        for value in &removed {
            value.set_parent(None);
        }
        if !removed.is_empty() {
            self.emit(ChangeKind::Remove, start);
        }
        if added > 0 {
            self.emit(ChangeKind::Add, start);
        }
        removed
    }

    /// Assigns the element at `index`. Returns `false` when the index is out
    /// of bounds or the new value is deep-equal to the current one.
    pub fn set(&self, index: usize, value: impl Into<ObservableValue>) -> bool {
        let value = value.into();
        let previous = {
            let node = self.node.borrow();
            match node.items.get(index) {
                None => return false,
                Some(current) if deep_equal(current, &value) => return false,
                Some(current) => current.clone(),
            }
        };
        self.attach(&value);
        self.node.borrow_mut().items[index] = value.clone();
        if !previous.same_node(&value) {
            previous.set_parent(None);
        }
        self.emit(ChangeKind::Set, index);
        true
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

    fn attach(&self, child: &ObservableValue) {
        child.set_parent(Some(ParentLink::Array {
            node: Rc::downgrade(&self.node),
        }));
    }

    fn emit(&self, kind: ChangeKind, index: usize) {
        let (listeners, parent) = {
            let node = self.node.borrow();
            (node.listeners.snapshot(), node.parent.clone())
        };
        notify(
            listeners,
            parent,
            self.as_ptr(),
            ChangeEvent::new(kind, vec![PathStep::Index(index)]),
        );
    }
}

impl fmt::Debug for ObservableArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObservableArray({})", self.to_json())
    }
}
