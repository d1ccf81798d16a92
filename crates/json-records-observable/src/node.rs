use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::array::ArrayNode;
use crate::events::{ChangeEvent, PathStep};
use crate::listeners::Listener;
use crate::object::ObjectNode;

/// Identity of a node, used to find a child inside its parent.
pub(crate) type NodePtr = *const ();

/// Weak back-reference from a nested node to the container holding it.
#[derive(Clone)]
pub(crate) enum ParentLink {
    Object {
        node: Weak<RefCell<ObjectNode>>,
        key: String,
    },
    Array {
        node: Weak<RefCell<ArrayNode>>,
    },
}

/// Delivers `event` to the origin node's listeners and then walks the parent
/// chain, prefixing the path at every hop.
///
/// A link whose parent no longer holds `origin` at the recorded slot is stale
/// (the child was detached or re-parented) and ends propagation.
pub(crate) fn notify(
    listeners: Vec<Listener<ChangeEvent>>,
    parent: Option<ParentLink>,
    origin: NodePtr,
    mut event: ChangeEvent,
) {
    tracing::trace!(kind = ?event.kind, path = ?event.path, "observable change");
    for listener in listeners {
        listener(&event);
    }

    let mut link = parent;
    let mut child = origin;
    while let Some(current) = link.take() {
        match current {
            ParentLink::Object { node, key } => {
                let Some(node) = node.upgrade() else { return };
                let (listeners, next) = {
                    let guard = node.borrow();
                    let holds_child = guard
                        .fields
                        .get(&key)
                        .and_then(|value| value.node_ptr())
                        .is_some_and(|ptr| ptr == child);
                    if !holds_child {
                        return;
                    }
                    (guard.listeners.snapshot(), guard.parent.clone())
                };
                event.prepend(PathStep::Key(key));
                for listener in listeners {
                    listener(&event);
                }
                child = Rc::as_ptr(&node) as NodePtr;
                link = next;
            }
            ParentLink::Array { node } => {
                let Some(node) = node.upgrade() else { return };
                let (listeners, next, index) = {
                    let guard = node.borrow();
                    let Some(index) = guard
                        .items
                        .iter()
                        .position(|item| item.node_ptr() == Some(child))
                    else {
                        return;
                    };
                    (guard.listeners.snapshot(), guard.parent.clone(), index)
                };
                event.prepend(PathStep::Index(index));
                for listener in listeners {
                    listener(&event);
                }
                child = Rc::as_ptr(&node) as NodePtr;
                link = next;
            }
        }
    }
}
