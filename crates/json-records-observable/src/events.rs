#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// An object key or array slot was assigned.
    Set,
    /// Elements were added to an array.
    Add,
    /// Elements or keys were removed.
    Remove,
}

/// A mutation observed at some node, with the path from the listening node
/// down to the mutated location.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: Vec<PathStep>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: Vec<PathStep>) -> Self {
        Self { kind, path }
    }

    /// The top-level key this event is attributed to, relative to the
    /// listening node.
    pub fn field(&self) -> Option<&str> {
        match self.path.first() {
            Some(PathStep::Key(key)) => Some(key.as_str()),
            _ => None,
        }
    }

    pub(crate) fn prepend(&mut self, step: PathStep) {
        self.path.insert(0, step);
    }
}
