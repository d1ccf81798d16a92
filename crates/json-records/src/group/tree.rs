use serde_json::Value;

use super::descriptor::GroupDescriptor;
use super::node::{Group, GroupItem};
use super::path::GroupPath;
use crate::aggregates::AggregateRegistry;
use crate::error::GroupError;
use crate::model::Model;

/// Grouping overlay over a record set.
///
/// The tree holds record handles, never copies: a record reached through the
/// tree is the same record stored in the flat set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupTree {
    groups: Vec<Group>,
}

impl GroupTree {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    /// Builds a tree from a pre-grouped payload (an array of group objects),
    /// wrapping every leaf with `make`.
    pub fn from_json(value: Value, mut make: impl FnMut(Value) -> Model) -> Result<Self, GroupError> {
        let raw_groups = match value {
            Value::Array(groups) => groups,
            Value::Null => Vec::new(),
            _ => return Err(GroupError::Malformed("expected an array of groups".into())),
        };
        let mut groups = Vec::with_capacity(raw_groups.len());
        for raw in raw_groups {
            groups.push(Group::from_json(raw, &mut make)?);
        }
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn leaves(&self) -> Vec<Model> {
        let mut out = Vec::new();
        for group in &self.groups {
            group.collect_leaves(&mut out);
        }
        out
    }

    /// Depth-first search for the first leaf carrying identity `id`.
    pub fn locate(&self, id: &Value) -> Option<(Model, GroupPath)> {
        if id.is_null() {
            return None;
        }
        self.find(&|model: &Model| model.id().as_ref() == Some(id))
    }

    /// Depth-first search for this exact record handle.
    pub fn locate_model(&self, model: &Model) -> Option<GroupPath> {
        self.find(&|candidate: &Model| candidate.ptr_eq(model))
            .map(|(_, path)| path)
    }

    /// Position of `model` in the flattened leaf order.
    pub fn flat_index_of(&self, model: &Model) -> Option<usize> {
        self.leaves().iter().position(|leaf| leaf.ptr_eq(model))
    }

    /// Removes the leaf carrying `id`, shrinking only its immediate parent.
    pub fn remove_by_identity(&mut self, id: &Value) -> Option<(Model, GroupPath)> {
        let (_, path) = self.locate(id)?;
        let model = self.remove_at(&path).ok()?;
        Some((model, path))
    }

    pub fn remove_model(&mut self, model: &Model) -> Option<GroupPath> {
        let path = self.locate_model(model)?;
        self.remove_at(&path).ok()?;
        Some(path)
    }

    pub fn remove_at(&mut self, path: &GroupPath) -> Result<Model, GroupError> {
        let invalid = || GroupError::InvalidPath(path.steps().to_vec());
        let leaf = path.leaf_index().ok_or_else(invalid)?;
        let group = self.group_mut(path.group_steps()).ok_or_else(invalid)?;
        match group.items.get(leaf) {
            Some(GroupItem::Record(_)) => {}
            _ => return Err(invalid()),
        }
        match group.items.remove(leaf) {
            GroupItem::Record(model) => Ok(model),
            GroupItem::Group(_) => Err(invalid()),
        }
    }

    /// Puts `model` back at `path`, the inverse of [`GroupTree::remove_at`].
    /// The leaf index is clamped to the group's current length.
    pub fn reinsert_at(&mut self, path: &GroupPath, model: Model) -> Result<(), GroupError> {
        let invalid = || GroupError::InvalidPath(path.steps().to_vec());
        let leaf = path.leaf_index().ok_or_else(invalid)?;
        let group = self.group_mut(path.group_steps()).ok_or_else(invalid)?;
        if group.has_subgroups {
            return Err(invalid());
        }
        let index = leaf.min(group.items.len());
        group.items.insert(index, GroupItem::Record(model));
        Ok(())
    }

    /// Steps to the leaf group whose values match `model` at every descriptor
    /// level.
    pub fn find_group_for(&self, model: &Model, descriptors: &[GroupDescriptor]) -> Option<Vec<usize>> {
        let (first, rest) = descriptors.split_first()?;
        let matches = |group: &Group, descriptor: &GroupDescriptor| {
            group.field == descriptor.field
                && group.value == model.get_json(&descriptor.field).unwrap_or(Value::Null)
        };

        let mut steps = Vec::with_capacity(descriptors.len());
        let root = self.groups.iter().position(|group| matches(group, first))?;
        steps.push(root);
        let mut current = &self.groups[root];
        for descriptor in rest {
            let (index, next) = current
                .items
                .iter()
                .enumerate()
                .find_map(|(index, item)| match item {
                    GroupItem::Group(group) if matches(group, descriptor) => Some((index, group)),
                    _ => None,
                })?;
            steps.push(index);
            current = next;
        }
        if current.has_subgroups {
            return None;
        }
        Some(steps)
    }

    pub fn insert_into_group(
        &mut self,
        group_steps: &[usize],
        index: usize,
        model: Model,
    ) -> Result<GroupPath, GroupError> {
        let group = self
            .group_mut(group_steps)
            .ok_or_else(|| GroupError::InvalidPath(group_steps.to_vec()))?;
        if group.has_subgroups {
            return Err(GroupError::InvalidPath(group_steps.to_vec()));
        }
        let index = index.min(group.items.len());
        group.items.insert(index, GroupItem::Record(model));
        let mut steps = group_steps.to_vec();
        steps.push(index);
        Ok(GroupPath::new(steps))
    }

    /// Inserts a root group at `index` (clamped).
    pub fn insert_group(&mut self, index: usize, group: Group) {
        let index = index.min(self.groups.len());
        self.groups.insert(index, group);
    }

    /// Wraps `model` in a chain of synthetic groups, one per descriptor,
    /// each keyed by the model's own value for that field and carrying every
    /// declared aggregate at its zero value.
    pub fn wrap_inserted(
        model: &Model,
        descriptors: &[GroupDescriptor],
        registry: &AggregateRegistry,
    ) -> Option<Group> {
        let mut wrapped: Option<Group> = None;
        for descriptor in descriptors.iter().rev() {
            let items = match wrapped.take() {
                Some(child) => vec![GroupItem::Group(child)],
                None => vec![GroupItem::Record(model.clone())],
            };
            let value = model.get_json(&descriptor.field).unwrap_or(Value::Null);
            let mut group = Group::new(descriptor.field.clone(), value, items)
                .with_aggregates(registry.seed(&descriptor.aggregates));
            group.synthetic = true;
            wrapped = Some(group);
        }
        wrapped
    }

    /// After a removal at `path`, drops synthetic ancestor groups left empty.
    pub fn prune_synthetic(&mut self, path: &GroupPath) {
        let group_steps = path.group_steps();
        for depth in (1..=group_steps.len()).rev() {
            let steps = &group_steps[..depth];
            let prune = self
                .group_mut(steps)
                .is_some_and(|group| group.synthetic && group.items.is_empty());
            if !prune {
                return;
            }
            let (last, parent_steps) = match steps.split_last() {
                Some(split) => split,
                None => return,
            };
            if parent_steps.is_empty() {
                self.groups.remove(*last);
            } else if let Some(parent) = self.group_mut(parent_steps) {
                parent.items.remove(*last);
            }
        }
    }

    /// Marks every group as committed.
    pub fn settle(&mut self) {
        for group in &mut self.groups {
            group.settle();
        }
    }

    /// Marks the groups along `path` as committed.
    pub fn settle_path(&mut self, path: &GroupPath) {
        let group_steps = path.group_steps();
        for depth in 1..=group_steps.len() {
            if let Some(group) = self.group_mut(&group_steps[..depth]) {
                group.synthetic = false;
            }
        }
    }

    fn find(&self, predicate: &dyn Fn(&Model) -> bool) -> Option<(Model, GroupPath)> {
        let mut steps = Vec::new();
        for (index, group) in self.groups.iter().enumerate() {
            steps.push(index);
            if let Some(model) = find_in(group, &mut steps, predicate) {
                return Some((model, GroupPath::new(steps)));
            }
            steps.pop();
        }
        None
    }

    fn group_mut(&mut self, steps: &[usize]) -> Option<&mut Group> {
        let (first, rest) = steps.split_first()?;
        let mut group = self.groups.get_mut(*first)?;
        for step in rest {
            group = match group.items.get_mut(*step)? {
                GroupItem::Group(child) => child,
                GroupItem::Record(_) => return None,
            };
        }
        Some(group)
    }
}

fn find_in(group: &Group, steps: &mut Vec<usize>, predicate: &dyn Fn(&Model) -> bool) -> Option<Model> {
    for (index, item) in group.items.iter().enumerate() {
        steps.push(index);
        match item {
            GroupItem::Record(model) if predicate(model) => return Some(model.clone()),
            GroupItem::Group(child) => {
                if let Some(found) = find_in(child, steps, predicate) {
                    return Some(found);
                }
            }
            GroupItem::Record(_) => {}
        }
        steps.pop();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelSchema;
    use serde_json::json;
    use std::rc::Rc;

    fn nested_tree() -> GroupTree {
        let schema = Rc::new(ModelSchema::new().with_id("id"));
        GroupTree::from_json(
            json!([
                {
                    "field": "foo", "value": 1, "hasSubgroups": true,
                    "items": [
                        {"field": "bar", "value": "a", "items": [{"id": 0, "foo": 1, "bar": "a"}]},
                        {"field": "bar", "value": "b", "items": [
                            {"id": 1, "foo": 1, "bar": "b"},
                            {"id": 2, "foo": 1, "bar": "b"}
                        ]}
                    ]
                },
                {"field": "foo", "value": 2, "items": []}
            ]),
            |values| Model::with_schema(values, Rc::clone(&schema)),
        )
        .expect("tree")
    }

    #[test]
    fn locate_returns_path_through_subgroups() {
        let tree = nested_tree();
        let (model, path) = tree.locate(&json!(2)).expect("found");
        assert_eq!(model.get_json("id"), Some(json!(2)));
        assert_eq!(path.steps(), &[0, 1, 1]);
        assert!(tree.locate(&json!(9)).is_none());
        assert!(tree.locate(&Value::Null).is_none());
    }

    #[test]
    fn remove_then_reinsert_restores_identical_structure() {
        let mut tree = nested_tree();
        let before = tree.clone();
        let (model, path) = tree.remove_by_identity(&json!(1)).expect("removed");

        let parent = tree.groups()[0].items[1].as_group().expect("group");
        assert_eq!(parent.items.len(), 1);
        let sibling = tree.groups()[0].items[0].as_group().expect("group");
        assert_eq!(sibling.items.len(), 1);

        tree.reinsert_at(&path, model).expect("reinsert");
        assert_eq!(tree, before);
    }

    #[test]
    fn reinsert_rejects_paths_into_subgroup_lists() {
        let mut tree = nested_tree();
        let model = Model::new(json!({}));
        let err = tree.reinsert_at(&GroupPath::new(vec![0, 0]), model).unwrap_err();
        assert_eq!(err, GroupError::InvalidPath(vec![0, 0]));
    }

    #[test]
    fn find_group_for_matches_every_level() {
        let tree = nested_tree();
        let descriptors = [GroupDescriptor::new("foo"), GroupDescriptor::new("bar")];
        let matching = Model::new(json!({"foo": 1, "bar": "b"}));
        let missing = Model::new(json!({"foo": 1, "bar": "z"}));
        assert_eq!(tree.find_group_for(&matching, &descriptors), Some(vec![0, 1]));
        assert_eq!(tree.find_group_for(&missing, &descriptors), None);
    }

    #[test]
    fn wrap_inserted_builds_chain_and_prune_removes_it() {
        let mut tree = GroupTree::default();
        let registry = AggregateRegistry::standard();
        let descriptors = [
            GroupDescriptor::new("foo").with_aggregate("foo", "count"),
            GroupDescriptor::new("bar"),
        ];
        let model = Model::new(json!({"foo": "x", "bar": "y"}));
        let group = GroupTree::wrap_inserted(&model, &descriptors, &registry).expect("group");
        assert!(group.has_subgroups);
        assert_eq!(group.aggregates["foo"]["count"], json!(0));
        let inner = group.items[0].as_group().expect("inner");
        assert!(!inner.has_subgroups);
        assert_eq!(inner.value, json!("y"));

        tree.insert_group(0, group);
        let path = tree.remove_model(&model).expect("path");
        tree.prune_synthetic(&path);
        assert!(tree.is_empty());
    }

    #[test]
    fn prune_keeps_loaded_groups() {
        let mut tree = nested_tree();
        let first = tree.leaves()[0].clone();
        let path = tree.remove_model(&first).expect("path");
        tree.prune_synthetic(&path);
        assert_eq!(tree.groups()[0].items.len(), 2);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let make = |values: Value| Model::new(values);
        assert!(GroupTree::from_json(json!({"field": "x"}), make).is_err());
        assert!(GroupTree::from_json(json!([{"value": 1}]), make).is_err());
        assert!(GroupTree::from_json(json!([{"field": "a", "items": 3}]), make).is_err());
    }
}
