//! Change-set controller.
//!
//! [`DataSource`] owns the flat [`RecordSet`] and, when grouping is
//! configured, the [`GroupTree`] overlaid on it. Every mutation goes through
//! here so both views change together:
//!
//! - with client grouping the tree is recomputed from the flat records after
//!   each membership change, and lazily on the next read after a field edit;
//! - with server grouping the tree is the source of truth for placement and
//!   is patched in place, and the flat order follows the tree's leaf order.

mod events;

pub use events::{Action, DataSourceEvent};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use json_records_observable::{dispatch, ListenerId, ListenerMap};
use serde_json::Value;

use crate::aggregates::AggregateRegistry;
use crate::error::DataSourceError;
use crate::group::{FieldGrouper, Group, GroupAggregates, GroupPath, GroupTree, Grouper};
use crate::model::{Model, WeakModel};
use crate::options::DataSourceOptions;
use crate::record_set::{same_members, CancelOutcome, RecordSet, RemovedRecord};
use crate::schema::Schema;
use crate::transport::Transport;

/// Either plain values, wrapped into a new record on insert, or an existing
/// record handle.
#[derive(Debug, Clone)]
pub enum RecordInput {
    Values(Value),
    Model(Model),
}

impl From<Value> for RecordInput {
    fn from(values: Value) -> Self {
        Self::Values(values)
    }
}

impl From<Model> for RecordInput {
    fn from(model: Model) -> Self {
        Self::Model(model)
    }
}

impl From<&Model> for RecordInput {
    fn from(model: &Model) -> Self {
        Self::Model(model.clone())
    }
}

/// What a caller renders: the flat records, or the root groups when
/// grouping is configured.
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    Flat(&'a [Model]),
    Grouped(&'a [Group]),
}

impl<'a> View<'a> {
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(records) => records.len(),
            Self::Grouped(groups) => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Option<&'a [Model]> {
        match *self {
            Self::Flat(records) => Some(records),
            Self::Grouped(_) => None,
        }
    }

    pub fn groups(&self) -> Option<&'a [Group]> {
        match *self {
            Self::Grouped(groups) => Some(groups),
            Self::Flat(_) => None,
        }
    }
}

pub struct DataSource {
    options: DataSourceOptions,
    schema: Schema,
    transport: Box<dyn Transport>,
    registry: AggregateRegistry,
    grouper: Box<dyn Grouper>,
    records: RecordSet,
    tree: Option<GroupTree>,
    /// Server-grouped tree as of the last load or commit.
    committed_tree: Option<GroupTree>,
    removed_paths: HashMap<u64, GroupPath>,
    bindings: HashMap<u64, (WeakModel, ListenerId)>,
    /// Set by record listeners when a field changed since the last client
    /// regroup.
    stale: Rc<Cell<bool>>,
    listeners: Rc<RefCell<ListenerMap<DataSourceEvent>>>,
    total: Option<usize>,
}

impl DataSource {
    pub fn new(options: DataSourceOptions, schema: Schema, transport: impl Transport + 'static) -> Self {
        let records = RecordSet::new(Rc::clone(schema.model()));
        let tree = options.is_grouped().then(GroupTree::default);
        Self {
            committed_tree: tree.clone(),
            tree,
            options,
            schema,
            transport: Box::new(transport),
            registry: AggregateRegistry::standard(),
            grouper: Box::new(FieldGrouper),
            records,
            removed_paths: HashMap::new(),
            bindings: HashMap::new(),
            stale: Rc::new(Cell::new(false)),
            listeners: Rc::new(RefCell::new(ListenerMap::new())),
            total: None,
        }
    }

    pub fn with_aggregates(mut self, registry: AggregateRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_grouper(mut self, grouper: impl Grouper + 'static) -> Self {
        self.grouper = Box::new(grouper);
        self
    }

    pub fn options(&self) -> &DataSourceOptions {
        &self.options
    }

    /// Loads a fresh payload from the transport, replacing all tracked state.
    ///
    /// On error nothing tracked is touched.
    pub fn read(&mut self) -> Result<(), DataSourceError> {
        let _span = tracing::debug_span!("read", grouped = self.options.is_grouped()).entered();
        let raw = self.transport.read()?;
        let payload = self.schema.parse(raw);
        let total = self.schema.total(&payload);

        let models: Vec<Model> = if self.options.is_server_grouped() {
            let model_schema = Rc::clone(self.schema.model());
            let tree = GroupTree::from_json(self.schema.groups(&payload), |values| {
                Model::with_schema(values, Rc::clone(&model_schema))
            })?;
            let leaves = tree.leaves();
            self.committed_tree = Some(tree.clone());
            self.tree = Some(tree);
            leaves
        } else {
            let rows = match self.schema.data(&payload) {
                Value::Array(rows) => rows,
                Value::Null => Vec::new(),
                other => {
                    return Err(DataSourceError::InvalidData(format!(
                        "expected an array of records, got {other}"
                    )))
                }
            };
            rows.into_iter().map(|row| self.records.create(row)).collect()
        };

        self.unbind_all();
        self.removed_paths.clear();
        self.records.reset(models);
        for model in self.records.data().to_vec() {
            self.bind(&model);
        }
        self.total = total;
        self.regroup();
        tracing::debug!(records = self.records.len(), total = ?self.total, "read complete");

        self.check_consistency()?;
        self.emit(DataSourceEvent::new(Action::Read, self.records.data().to_vec()));
        Ok(())
    }

    pub fn data(&self) -> &[Model] {
        self.records.data()
    }

    /// Grouped view when grouping is configured, flat otherwise.
    ///
    /// Under client grouping a field edit made since the last rebuild is
    /// folded in first, so records sit under their current values.
    pub fn view(&mut self) -> View<'_> {
        self.refresh();
        match &self.tree {
            Some(tree) if self.options.is_grouped() => View::Grouped(tree.groups()),
            _ => View::Flat(self.records.data()),
        }
    }

    pub fn tree(&mut self) -> Option<&GroupTree> {
        self.refresh();
        self.tree.as_ref()
    }

    /// Pending-change ledgers.
    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    pub fn get(&self, id: &Value) -> Option<Model> {
        self.records.get(id)
    }

    pub fn index_of(&self, model: &Model) -> Option<usize> {
        self.records.index_of(model)
    }

    /// Server-reported total when the schema extracts one, otherwise the
    /// number of present records.
    pub fn total(&self) -> usize {
        self.total.unwrap_or_else(|| self.records.len())
    }

    /// Aggregates declared in the options, over every present record.
    pub fn aggregates(&self) -> GroupAggregates {
        self.registry.compute(&self.options.aggregate, self.records.data())
    }

    pub fn add(&mut self, input: impl Into<RecordInput>) -> Model {
        let len = self.records.len();
        self.insert(len, input)
    }

    /// Inserts a record; a missing index means the head of the set.
    ///
    /// Under server grouping the record joins the group matching its field
    /// values, or a new chain of groups when none matches. Either way it goes
    /// to the front when `index` is 0 and to the end otherwise.
    pub fn insert(&mut self, index: impl Into<Option<usize>>, input: impl Into<RecordInput>) -> Model {
        let index = index.into().unwrap_or(0);
        let model = match input.into() {
            RecordInput::Values(values) => self.records.create(values),
            RecordInput::Model(model) => model,
        };
        if let Some(existing) = self.records.index_of(&model) {
            return self.records.data()[existing].clone();
        }

        let _span = tracing::debug_span!("insert", uid = model.uid(), index).entered();
        self.removed_paths.remove(&model.uid());
        let model = self.records.insert(index, model);
        self.bind(&model);
        if self.options.is_server_grouped() {
            self.place_in_tree(&model, index);
            self.sync_flat_order();
        } else {
            self.regroup();
        }
        self.verify("insert");

        let at = self.records.index_of(&model).unwrap_or(index);
        self.emit(DataSourceEvent::new(Action::Add, vec![model.clone()]).at(at));
        model
    }

    /// Removes the matching record from the set and from the overlay.
    /// Returns `None` and changes nothing when it is not present.
    pub fn remove(&mut self, model: &Model) -> Option<Model> {
        let (removed, index) = self.records.remove(model)?;
        let _span = tracing::debug_span!("remove", uid = removed.uid(), index).entered();

        if self.options.is_server_grouped() {
            let path = self.tree.as_mut().and_then(|tree| {
                let path = tree.remove_model(&removed)?;
                tree.prune_synthetic(&path);
                Some(path)
            });
            match path {
                Some(path) if self.records.is_removed(&removed) => {
                    self.removed_paths.insert(removed.uid(), path);
                }
                Some(_) => {}
                None => tracing::error!(uid = removed.uid(), "removed record missing from group tree"),
            }
        } else {
            self.regroup();
        }
        if !self.records.is_removed(&removed) {
            self.unbind(&removed);
        }
        self.verify("remove");

        self.emit(DataSourceEvent::new(Action::Remove, vec![removed.clone()]).at(index));
        Some(removed)
    }

    /// Rolls back pending changes: all of them, or only those of `target`.
    pub fn cancel_changes(&mut self, target: Option<&Model>) -> Result<(), DataSourceError> {
        match target {
            None => self.cancel_all(),
            Some(model) => {
                self.cancel_record(model);
                Ok(())
            }
        }
    }

    /// Restores the exact state of the last load or commit.
    pub fn cancel_all(&mut self) -> Result<(), DataSourceError> {
        let _span = tracing::debug_span!("cancel_changes", scope = "all").entered();
        let discarded = self.records.cancel_all()?;
        for model in &discarded {
            self.unbind(model);
        }
        self.removed_paths.clear();
        if self.options.is_server_grouped() {
            self.tree = self.committed_tree.clone();
        } else {
            self.regroup();
        }
        self.check_consistency()?;

        self.emit(DataSourceEvent::new(Action::Cancel, self.records.data().to_vec()));
        Ok(())
    }

    /// Rolls back the pending change of `model` without touching any other
    /// record.
    pub fn cancel_record(&mut self, model: &Model) -> CancelOutcome {
        let _span = tracing::debug_span!("cancel_changes", uid = model.uid()).entered();
        let outcome = self.records.cancel(model);
        let server = self.options.is_server_grouped();

        match outcome {
            CancelOutcome::Restored { index } if server => {
                // Root indexes may have shifted since the removal; only the
                // leaf position is reused, the group is found by value.
                let leaf = self
                    .removed_paths
                    .remove(&model.uid())
                    .and_then(|path| path.leaf_index());
                let restored = match (leaf, self.tree.as_mut()) {
                    (Some(leaf), Some(tree)) => tree
                        .find_group_for(model, &self.options.group)
                        .and_then(|steps| tree.insert_into_group(&steps, leaf, model.clone()).ok()),
                    _ => None,
                };
                if restored.is_none() {
                    tracing::debug!(uid = model.uid(), "original group gone, placing by value");
                    self.place_in_tree(model, index);
                }
                self.sync_flat_order();
            }
            CancelOutcome::Discarded { .. } => {
                if server {
                    if let Some(tree) = self.tree.as_mut() {
                        if let Some(path) = tree.remove_model(model) {
                            tree.prune_synthetic(&path);
                        }
                    }
                }
                self.unbind(model);
            }
            _ => {}
        }
        if !server {
            self.regroup();
        }
        self.verify("cancel record");

        if outcome != CancelOutcome::Unchanged {
            let mut event = DataSourceEvent::new(Action::Cancel, vec![model.clone()]);
            if let CancelOutcome::Restored { index } | CancelOutcome::Discarded { index } = outcome {
                event = event.at(index);
            }
            self.emit(event);
        }
        outcome
    }

    /// Commits every pending change and returns the committed removals.
    pub fn accept_changes(&mut self) -> Vec<RemovedRecord> {
        let _span = tracing::debug_span!("accept_changes").entered();
        let removed = self.records.accept_changes();
        for entry in &removed {
            self.unbind(&entry.model);
        }
        self.removed_paths.clear();
        if self.options.is_server_grouped() {
            if let Some(tree) = self.tree.as_mut() {
                tree.settle();
            }
            self.committed_tree = self.tree.clone();
        }
        tracing::debug!(removed = removed.len(), "changes accepted");

        self.emit(DataSourceEvent::new(Action::Sync, self.records.data().to_vec()));
        removed
    }

    /// Commits one record, merging `values` (for example a server-assigned
    /// id) over its live fields. Returns `false` when it is not tracked.
    pub fn commit(&mut self, model: &Model, values: Option<Value>) -> bool {
        let _span = tracing::debug_span!("commit", uid = model.uid()).entered();
        let was_removed = self.records.is_removed(model);
        let was_uncommitted = self.records.is_present(model) && !self.records.is_committed(model);
        if !self.records.commit(model, values) {
            return false;
        }

        if self.options.is_server_grouped() {
            if was_removed {
                self.removed_paths.remove(&model.uid());
                if let Some(committed) = self.committed_tree.as_mut() {
                    committed.remove_model(model);
                }
            } else if was_uncommitted {
                self.commit_into_tree(model);
            }
            let order = self
                .committed_tree
                .as_ref()
                .map(GroupTree::leaves)
                .unwrap_or_default();
            if !self.records.set_committed_order(order) {
                tracing::error!(uid = model.uid(), "committed group tree diverged from commit point");
            }
        } else {
            self.regroup();
        }
        if was_removed {
            self.unbind(model);
        }

        self.emit(DataSourceEvent::new(Action::Sync, vec![model.clone()]));
        true
    }

    pub fn has_changes(&self) -> bool {
        self.records.has_changes()
    }

    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&DataSourceEvent) + 'static,
    {
        self.listeners.borrow_mut().add(listener)
    }

    pub fn off_change(&self, id: ListenerId) -> bool {
        self.listeners.borrow_mut().remove(id)
    }

    /// Verifies that the overlay holds exactly the present records, and under
    /// server grouping that its leaf order is the flat order.
    pub fn check_consistency(&self) -> Result<(), DataSourceError> {
        let Some(tree) = self.tree.as_ref().filter(|_| self.options.is_grouped()) else {
            return Ok(());
        };
        let leaves = tree.leaves();
        let data = self.records.data();
        if !same_members(&leaves, data) {
            return Err(DataSourceError::StructuralMismatch(format!(
                "group tree holds {} records, record set holds {}",
                leaves.len(),
                data.len()
            )));
        }
        if self.options.is_server_grouped()
            && leaves.iter().zip(data).any(|(leaf, record)| !leaf.ptr_eq(record))
        {
            return Err(DataSourceError::StructuralMismatch(
                "flat order differs from group leaf order".into(),
            ));
        }
        Ok(())
    }

    fn verify(&self, operation: &'static str) {
        let result = self.check_consistency();
        if let Err(err) = &result {
            tracing::error!(operation, error = %err, "record set and group tree diverged");
        }
        debug_assert!(result.is_ok(), "{operation}: {result:?}");
    }

    fn refresh(&mut self) {
        if self.stale.get() {
            self.regroup();
        }
    }

    fn regroup(&mut self) {
        self.stale.set(false);
        if !self.options.is_grouped() || self.options.is_server_grouped() {
            return;
        }
        let groups = self
            .grouper
            .group(self.records.data(), &self.options.group, &self.registry);
        self.tree = Some(GroupTree::new(groups));
    }

    fn place_in_tree(&mut self, model: &Model, index: usize) {
        let tree = self.tree.get_or_insert_with(GroupTree::default);
        let front = index == 0;
        if let Some(steps) = tree.find_group_for(model, &self.options.group) {
            let at = if front { 0 } else { usize::MAX };
            match tree.insert_into_group(&steps, at, model.clone()) {
                Ok(_) => return,
                Err(err) => tracing::debug!(%err, "matching group rejected record"),
            }
        }
        if let Some(group) = GroupTree::wrap_inserted(model, &self.options.group, &self.registry) {
            let at = if front { 0 } else { tree.len() };
            tree.insert_group(at, group);
        }
    }

    /// Mirrors a newly committed insert into the commit-point tree.
    fn commit_into_tree(&mut self, model: &Model) {
        let Some(path) = self.tree.as_mut().and_then(|tree| {
            let path = tree.locate_model(model)?;
            tree.settle_path(&path);
            Some(path)
        }) else {
            return;
        };

        let committed = self.committed_tree.get_or_insert_with(GroupTree::default);
        if let Some(steps) = committed.find_group_for(model, &self.options.group) {
            let leaf = path.leaf_index().unwrap_or(0);
            if committed.insert_into_group(&steps, leaf, model.clone()).is_ok() {
                return;
            }
        }
        if let Some(mut group) = GroupTree::wrap_inserted(model, &self.options.group, &self.registry) {
            group.settle();
            let root = path.steps().first().copied().unwrap_or(0);
            committed.insert_group(root, group);
        }
    }

    fn sync_flat_order(&mut self) {
        let Some(order) = self.tree.as_ref().map(GroupTree::leaves) else {
            return;
        };
        if !self.records.set_order(order) {
            tracing::error!("group tree leaves differ from present records");
        }
    }

    /// Forwards field changes of `model` as [`Action::ItemChange`] events and
    /// marks the client grouping stale.
    fn bind(&mut self, model: &Model) {
        if self.bindings.contains_key(&model.uid()) {
            return;
        }
        let hub = Rc::downgrade(&self.listeners);
        let stale = Rc::downgrade(&self.stale);
        let weak = model.downgrade();
        let id = model.on_change(move |change| {
            if let Some(stale) = stale.upgrade() {
                stale.set(true);
            }
            let (Some(hub), Some(model)) = (hub.upgrade(), weak.upgrade()) else {
                return;
            };
            let event = DataSourceEvent {
                action: Action::ItemChange,
                items: vec![model],
                index: None,
                field: change.field().map(str::to_owned),
            };
            dispatch(&hub, &event);
        });
        self.bindings.insert(model.uid(), (model.downgrade(), id));
    }

    fn unbind(&mut self, model: &Model) {
        if let Some((_, id)) = self.bindings.remove(&model.uid()) {
            model.off_change(id);
        }
    }

    fn unbind_all(&mut self) {
        for (_, (weak, id)) in self.bindings.drain() {
            if let Some(model) = weak.upgrade() {
                model.off_change(id);
            }
        }
    }

    fn emit(&self, event: DataSourceEvent) {
        dispatch(&self.listeners, &event);
    }
}

impl Drop for DataSource {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("options", &self.options)
            .field("schema", &self.schema)
            .field("registry", &self.registry)
            .field("records", &self.records)
            .field("tree", &self.tree)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}
