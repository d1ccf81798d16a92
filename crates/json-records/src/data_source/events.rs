use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The tracked state was rebuilt from the transport.
    Read,
    Add,
    Remove,
    /// A field of a tracked record changed.
    ItemChange,
    Cancel,
    /// Pending changes were committed.
    Sync,
}

/// Notification emitted by a [`DataSource`](super::DataSource).
#[derive(Debug, Clone)]
pub struct DataSourceEvent {
    pub action: Action,
    pub items: Vec<Model>,
    /// Flat index of the affected record, when a single one moved.
    pub index: Option<usize>,
    /// Top-level field that changed, for [`Action::ItemChange`].
    pub field: Option<String>,
}

impl DataSourceEvent {
    pub(crate) fn new(action: Action, items: Vec<Model>) -> Self {
        Self {
            action,
            items,
            index: None,
            field: None,
        }
    }

    pub(crate) fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}
