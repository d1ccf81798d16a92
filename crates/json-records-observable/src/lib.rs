//! Observable JSON values.
//!
//! Wraps `serde_json::Value` trees so that every structural mutation is
//! reported to the listeners of the mutated node and then to the listeners of
//! each ancestor. A listener registered on a root [`ObservableObject`] sees
//! every change made anywhere beneath it, and the first step of the event path
//! names the top-level field that owns the change.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use json_records_observable::{ObservableObject, ObservableValue};
//! use serde_json::json;
//!
//! let root = ObservableObject::from_value(json!({"tags": ["a"], "meta": {"n": 1}}));
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! root.on_change(move |event| {
//!     sink.borrow_mut().push(event.field().map(str::to_owned));
//! });
//!
//! if let Some(ObservableValue::Array(tags)) = root.get("tags") {
//!     tags.push("b");
//! }
//! assert_eq!(seen.borrow().as_slice(), &[Some("tags".to_string())]);
//! ```
//!
//! Fields whose names start with [`RESERVED_PREFIX`] hold inert plain data:
//! they are never wrapped and assigning them never emits an event.

mod array;
mod equal;
mod events;
mod listeners;
mod node;
mod object;
mod value;

pub use array::ObservableArray;
pub use equal::deep_equal;
pub use events::{ChangeEvent, ChangeKind, PathStep};
pub use listeners::{dispatch, Listener, ListenerId, ListenerMap};
pub use object::ObservableObject;
pub use value::ObservableValue;

/// Field-name prefix marking opaque, untracked data.
pub const RESERVED_PREFIX: char = '_';

/// Returns `true` when `name` is excluded from change tracking.
pub fn is_reserved_field(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}
