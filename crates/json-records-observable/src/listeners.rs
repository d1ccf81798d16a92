use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Handle returned when registering a listener; pass it back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Ordered listener registry.
///
/// Listeners are stored behind `Rc` so callers can take a snapshot and release
/// any borrow of the owning structure before invoking them.
pub struct ListenerMap<E: ?Sized> {
    next_id: u64,
    entries: BTreeMap<u64, Listener<E>>,
}

impl<E: ?Sized> Default for ListenerMap<E> {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: BTreeMap::new(),
        }
    }
}

impl<E: ?Sized> ListenerMap<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&E) + 'static,
    {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.entries.insert(id, Rc::new(listener));
        ListenerId(id)
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.entries.remove(&id.0).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Listener<E>> {
        self.entries.values().cloned().collect()
    }
}

impl<E: ?Sized> fmt::Debug for ListenerMap<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerMap")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Invokes every listener in `map` with `event`.
///
/// The map is only borrowed while the snapshot is taken, so listeners may
/// register or remove listeners on the same map.
pub fn dispatch<E: ?Sized>(map: &RefCell<ListenerMap<E>>, event: &E) {
    let listeners = map.borrow().snapshot();
    for listener in listeners {
        listener(event);
    }
}
