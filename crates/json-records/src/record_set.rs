//! Flat record sequence with pending-change bookkeeping.
//!
//! Besides the live sequence the set keeps the commit-point order: the exact
//! sequence of handles as of the last load or commit. Cancelling everything
//! rebuilds the live sequence from it, so removed records land back in their
//! original slots and uncommitted inserts disappear without any index replay.

use std::rc::Rc;

use serde_json::Value;

use crate::error::DataSourceError;
use crate::model::{Model, ModelSchema};

/// A record taken out of the sequence, with the flat index it held.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedRecord {
    pub model: Model,
    pub index: usize,
}

/// What a scoped cancel did to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A removed record went back to `index`.
    Restored { index: usize },
    /// An uncommitted insert was dropped from `index`.
    Discarded { index: usize },
    /// A present record had its edits rolled back.
    Reverted,
    /// Nothing pending for the target.
    Unchanged,
}

#[derive(Debug)]
pub struct RecordSet {
    schema: Rc<ModelSchema>,
    data: Vec<Model>,
    committed: Vec<Model>,
    inserted: Vec<Model>,
    removed: Vec<RemovedRecord>,
}

impl RecordSet {
    pub fn new(schema: Rc<ModelSchema>) -> Self {
        Self {
            schema,
            data: Vec::new(),
            committed: Vec::new(),
            inserted: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Rc<ModelSchema> {
        &self.schema
    }

    /// Wraps plain values as a record of this set's schema. The record is
    /// not inserted.
    pub fn create(&self, values: Value) -> Model {
        Model::with_schema(values, Rc::clone(&self.schema))
    }

    /// Replaces the whole tracked state; `models` becomes the commit point.
    pub fn reset(&mut self, models: Vec<Model>) {
        self.committed = models.clone();
        self.data = models;
        self.inserted.clear();
        self.removed.clear();
    }

    pub fn data(&self) -> &[Model] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Present record with identity `id`. Records without identity are never
    /// matched.
    pub fn get(&self, id: &Value) -> Option<Model> {
        if id.is_null() {
            return None;
        }
        self.data
            .iter()
            .find(|model| model.id().as_ref() == Some(id))
            .cloned()
    }

    pub fn index_of(&self, model: &Model) -> Option<usize> {
        self.data.iter().position(|candidate| candidate.same_record(model))
    }

    /// Inserts `model` at `index` (clamped) and returns the stored handle.
    ///
    /// A record already present is returned as is. Re-inserting a removed
    /// handle takes it out of the removed ledger instead of recording an
    /// insert.
    pub fn insert(&mut self, index: usize, model: Model) -> Model {
        if let Some(existing) = self.index_of(&model) {
            return self.data[existing].clone();
        }
        let index = index.min(self.data.len());
        tracing::debug!(uid = model.uid(), index, "insert record");

        if let Some(at) = self.removed_position(&model) {
            self.removed.remove(at);
        } else if model.is_new() {
            self.inserted.push(model.clone());
        }
        self.data.insert(index, model.clone());
        model
    }

    pub fn add(&mut self, model: Model) -> Model {
        let len = self.data.len();
        self.insert(len, model)
    }

    /// Takes the matching record out of the sequence.
    ///
    /// Records that never reached the commit point are purged outright;
    /// committed ones move to the removed ledger with their index.
    pub fn remove(&mut self, model: &Model) -> Option<(Model, usize)> {
        let index = self.index_of(model)?;
        let removed = self.data.remove(index);
        tracing::debug!(uid = removed.uid(), index, "remove record");

        if let Some(at) = self.inserted.iter().position(|m| m.ptr_eq(&removed)) {
            self.inserted.remove(at);
        } else if self.is_committed(&removed) {
            self.removed.push(RemovedRecord {
                model: removed.clone(),
                index,
            });
        }
        Some((removed, index))
    }

    pub fn is_inserted(&self, model: &Model) -> bool {
        self.inserted.iter().any(|m| m.ptr_eq(model))
    }

    pub fn is_removed(&self, model: &Model) -> bool {
        self.removed_position(model).is_some()
    }

    /// Drops the removed-ledger entry for `model` and hands it back.
    pub fn take_removed(&mut self, model: &Model) -> Option<RemovedRecord> {
        let at = self.removed_position(model)?;
        Some(self.removed.remove(at))
    }

    /// Puts a removed record back at its recorded index (clamped) with its
    /// edits reverted. Returns the index used.
    ///
    /// The index is the one recorded at removal time and is not rebased on
    /// later restores, so records restored one by one in a different order
    /// from their removal can come back in a different order. Use
    /// [`RecordSet::cancel_all`] for an exact rollback.
    pub fn restore(&mut self, entry: RemovedRecord) -> usize {
        let index = entry.index.min(self.data.len());
        entry.model.revert();
        self.data.insert(index, entry.model);
        index
    }

    /// Rolls back every pending change and returns the discarded inserts.
    ///
    /// Fails without touching anything if a commit-point record is neither
    /// present nor in the removed ledger.
    pub fn cancel_all(&mut self) -> Result<Vec<Model>, DataSourceError> {
        if let Some(missing) = self
            .committed
            .iter()
            .find(|m| !self.is_present(m) && !self.is_removed(m))
        {
            return Err(DataSourceError::StructuralMismatch(format!(
                "committed record {} is neither present nor removed",
                missing.uid()
            )));
        }

        let discarded: Vec<Model> = self
            .data
            .iter()
            .filter(|m| !self.is_committed(m))
            .cloned()
            .collect();
        tracing::debug!(
            discarded = discarded.len(),
            restored = self.removed.len(),
            "cancel all changes"
        );

        self.data = self.committed.clone();
        for model in &self.data {
            if model.dirty() {
                model.revert();
            }
        }
        self.inserted.clear();
        self.removed.clear();
        Ok(discarded)
    }

    /// Rolls back the pending change of `model` alone.
    pub fn cancel(&mut self, model: &Model) -> CancelOutcome {
        if let Some(entry) = self.take_removed(model) {
            let index = self.restore(entry);
            tracing::debug!(uid = model.uid(), index, "cancel restored record");
            return CancelOutcome::Restored { index };
        }

        let Some(index) = self.data.iter().position(|m| m.ptr_eq(model)) else {
            return CancelOutcome::Unchanged;
        };
        if !self.is_committed(model) {
            self.data.remove(index);
            self.inserted.retain(|m| !m.ptr_eq(model));
            tracing::debug!(uid = model.uid(), index, "cancel discarded record");
            return CancelOutcome::Discarded { index };
        }
        if model.dirty() {
            model.revert();
            return CancelOutcome::Reverted;
        }
        CancelOutcome::Unchanged
    }

    /// Commits every pending change: present records accept their live
    /// values and the current order becomes the commit point. Returns the
    /// records whose removal was committed.
    pub fn accept_changes(&mut self) -> Vec<RemovedRecord> {
        for model in &self.data {
            if model.dirty() || !self.is_committed(model) {
                model.accept(model.to_json());
            }
        }
        self.inserted.clear();
        self.committed = self.data.clone();
        std::mem::take(&mut self.removed)
    }

    /// Commits a single record.
    ///
    /// `values` (for example a server-assigned id) are merged over the live
    /// fields before accepting. A removed record has its removal committed.
    /// Returns `false` when the record is not tracked.
    pub fn commit(&mut self, model: &Model, values: Option<Value>) -> bool {
        if let Some(entry) = self.take_removed(model) {
            self.committed.retain(|m| !m.ptr_eq(&entry.model));
            return true;
        }
        let Some(index) = self.data.iter().position(|m| m.ptr_eq(model)) else {
            return false;
        };

        let mut merged = match model.to_json() {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        if let Some(Value::Object(extra)) = values {
            merged.extend(extra);
        }
        model.accept(Value::Object(merged));
        self.inserted.retain(|m| !m.ptr_eq(model));

        if !self.is_committed(model) {
            let at = self.data[..index]
                .iter()
                .rev()
                .find_map(|prev| self.committed.iter().position(|m| m.ptr_eq(prev)))
                .map_or(0, |at| at + 1);
            self.committed.insert(at, model.clone());
        }
        true
    }

    /// New records inserted since the commit point.
    pub fn inserted(&self) -> &[Model] {
        &self.inserted
    }

    pub fn removed(&self) -> &[RemovedRecord] {
        &self.removed
    }

    /// Committed records present with unsaved edits.
    pub fn updated(&self) -> Vec<Model> {
        self.data
            .iter()
            .filter(|m| m.dirty() && self.is_committed(m))
            .cloned()
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.inserted.is_empty()
            || !self.removed.is_empty()
            || self.data.len() != self.committed.len()
            || self
                .data
                .iter()
                .zip(&self.committed)
                .any(|(live, committed)| !live.ptr_eq(committed) || live.dirty())
    }

    /// Order as of the last load or commit.
    pub fn committed(&self) -> &[Model] {
        &self.committed
    }

    /// Replaces the live order with a permutation of the present records.
    /// Returns `false`, leaving the order alone, when `order` holds
    /// different records.
    pub(crate) fn set_order(&mut self, order: Vec<Model>) -> bool {
        if !same_members(&order, &self.data) {
            return false;
        }
        self.data = order;
        true
    }

    /// Replaces the commit-point order with a permutation of itself.
    pub(crate) fn set_committed_order(&mut self, order: Vec<Model>) -> bool {
        if !same_members(&order, &self.committed) {
            return false;
        }
        self.committed = order;
        true
    }

    pub fn is_present(&self, model: &Model) -> bool {
        self.data.iter().any(|m| m.ptr_eq(model))
    }

    /// `true` when `model` is part of the commit-point order.
    pub fn is_committed(&self, model: &Model) -> bool {
        self.committed.iter().any(|m| m.ptr_eq(model))
    }

    fn removed_position(&self, model: &Model) -> Option<usize> {
        self.removed.iter().position(|entry| entry.model.ptr_eq(model))
    }
}

pub(crate) fn same_members(a: &[Model], b: &[Model]) -> bool {
    a.len() == b.len() && a.iter().all(|m| b.iter().any(|other| other.ptr_eq(m)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loaded(rows: &[Value]) -> RecordSet {
        let mut set = RecordSet::new(Rc::new(ModelSchema::new().with_id("id")));
        let models = rows.iter().cloned().map(|row| set.create(row)).collect();
        set.reset(models);
        set
    }

    fn ids(set: &RecordSet) -> Vec<Value> {
        set.data()
            .iter()
            .map(|m| m.get_json("id").unwrap_or(Value::Null))
            .collect()
    }

    #[test]
    fn get_ignores_null_identity() {
        let set = loaded(&[json!({"id": 1}), json!({"foo": "x"})]);
        assert!(set.get(&json!(1)).is_some());
        assert!(set.get(&Value::Null).is_none());
        assert!(set.get(&json!(5)).is_none());
    }

    #[test]
    fn insert_clamps_and_tracks_new_records() {
        let mut set = loaded(&[json!({"id": 1})]);
        let model = set.create(json!({"foo": "bar"}));
        set.insert(10, model.clone());
        assert_eq!(set.index_of(&model), Some(1));
        assert!(set.is_inserted(&model));
        assert_eq!(set.inserted().len(), 1);
    }

    #[test]
    fn insert_returns_existing_record() {
        let mut set = loaded(&[json!({"id": 1})]);
        let first = set.data()[0].clone();
        let returned = set.insert(0, first.clone());
        assert!(returned.ptr_eq(&first));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn removing_missing_record_is_a_no_op() {
        let mut set = loaded(&[json!({"id": 1}), json!({"id": 2})]);
        let stranger = set.create(json!({"id": 3}));
        assert!(set.remove(&stranger).is_none());
        assert_eq!(ids(&set), vec![json!(1), json!(2)]);
        assert!(!set.has_changes());
    }

    #[test]
    fn insert_then_remove_leaves_no_trace() {
        let mut set = loaded(&[json!({"id": 1})]);
        let model = set.insert(0, set.create(json!({"foo": "x"})));
        set.remove(&model);
        assert!(set.inserted().is_empty());
        assert!(set.removed().is_empty());
        assert!(!set.has_changes());
    }

    #[test]
    fn cancel_all_restores_commit_point() {
        let mut set = loaded(&[json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
        let two = set.get(&json!(2)).expect("two");
        two.set("foo", "changed");
        set.remove(&two);
        let one = set.get(&json!(1)).expect("one");
        set.remove(&one);
        set.insert(0, set.create(json!({"foo": "new"})));

        let discarded = set.cancel_all().expect("cancel");
        assert_eq!(discarded.len(), 1);
        assert_eq!(ids(&set), vec![json!(1), json!(2), json!(3)]);
        assert!(!two.dirty());
        assert_eq!(two.get_json("foo"), None);
        assert!(!set.has_changes());
    }

    #[test]
    fn scoped_cancel_touches_only_its_target() {
        let mut set = loaded(&[json!({"id": 1, "v": 1}), json!({"id": 2, "v": 2})]);
        let a = set.get(&json!(1)).expect("a");
        let b = set.get(&json!(2)).expect("b");
        a.set("v", 10);
        b.set("v", 20);

        assert_eq!(set.cancel(&a), CancelOutcome::Reverted);
        assert_eq!(a.get_json("v"), Some(json!(1)));
        assert!(b.dirty());
        assert_eq!(b.get_json("v"), Some(json!(20)));
        assert_eq!(set.cancel(&a), CancelOutcome::Unchanged);
    }

    #[test]
    fn scoped_cancel_restores_removed_record() {
        let mut set = loaded(&[json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
        let two = set.get(&json!(2)).expect("two");
        set.remove(&two);
        let three = set.get(&json!(3)).expect("three");
        set.remove(&three);

        assert_eq!(set.cancel(&two), CancelOutcome::Restored { index: 1 });
        assert_eq!(ids(&set), vec![json!(1), json!(2)]);
        assert!(set.is_removed(&three));
        assert_eq!(set.cancel(&two), CancelOutcome::Unchanged);
    }

    #[test]
    fn out_of_order_restores_keep_removal_indexes() {
        let mut set = loaded(&[json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
        let one = set.get(&json!(1)).expect("one");
        let three = set.get(&json!(3)).expect("three");
        set.remove(&one);
        set.remove(&three);

        assert_eq!(set.cancel(&one), CancelOutcome::Restored { index: 0 });
        assert_eq!(set.cancel(&three), CancelOutcome::Restored { index: 1 });
        assert_eq!(ids(&set), vec![json!(1), json!(3), json!(2)]);

        set.cancel_all().expect("cancel all");
        assert_eq!(ids(&set), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn scoped_cancel_discards_insert() {
        let mut set = loaded(&[json!({"id": 1})]);
        let model = set.insert(0, set.create(json!({"foo": "x"})));
        assert_eq!(set.cancel(&model), CancelOutcome::Discarded { index: 0 });
        assert_eq!(ids(&set), vec![json!(1)]);
        assert!(set.inserted().is_empty());
    }

    #[test]
    fn cancel_all_reports_missing_committed_record() {
        let mut set = loaded(&[json!({"id": 1})]);
        let one = set.get(&json!(1)).expect("one");
        set.remove(&one);
        set.take_removed(&one);
        assert!(matches!(
            set.cancel_all(),
            Err(DataSourceError::StructuralMismatch(_))
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn accept_changes_moves_commit_point() {
        let mut set = loaded(&[json!({"id": 1}), json!({"id": 2})]);
        let one = set.get(&json!(1)).expect("one");
        set.remove(&one);
        let added = set.add(set.create(json!({"foo": "x"})));
        added.set("foo", "y");

        let removed = set.accept_changes();
        assert_eq!(removed.len(), 1);
        assert!(!set.has_changes());
        assert_eq!(added.pristine(), json!({"foo": "y"}));

        set.cancel_all().expect("cancel");
        assert_eq!(set.len(), 2);
        assert!(set.data()[1].ptr_eq(&added));
    }

    #[test]
    fn commit_merges_server_values() {
        let mut set = loaded(&[json!({"id": 1})]);
        let model = set.insert(1, set.create(json!({"foo": "x"})));
        assert!(set.commit(&model, Some(json!({"id": 7}))));
        assert_eq!(model.to_json(), json!({"foo": "x", "id": 7}));
        assert!(!model.is_new());
        assert_eq!(set.committed().len(), 2);
        assert!(set.committed()[1].ptr_eq(&model));
        assert!(!set.has_changes());
    }

    #[test]
    fn updated_lists_dirty_committed_records() {
        let set = loaded(&[json!({"id": 1}), json!({"id": 2})]);
        set.data()[1].set("foo", "x");
        let updated = set.updated();
        assert_eq!(updated.len(), 1);
        assert!(updated[0].ptr_eq(&set.data()[1]));
    }
}
