use serde_json::Value;

use super::descriptor::GroupDescriptor;
use super::node::{Group, GroupItem};
use crate::aggregates::AggregateRegistry;
use crate::model::Model;

/// Local grouping strategy, used when the backend does not group.
pub trait Grouper {
    fn group(
        &self,
        records: &[Model],
        descriptors: &[GroupDescriptor],
        registry: &AggregateRegistry,
    ) -> Vec<Group>;
}

/// Buckets records by exact field value, one level per descriptor.
///
/// Buckets keep the order in which their value first appears, and records
/// keep their relative order inside a bucket.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldGrouper;

impl Grouper for FieldGrouper {
    fn group(
        &self,
        records: &[Model],
        descriptors: &[GroupDescriptor],
        registry: &AggregateRegistry,
    ) -> Vec<Group> {
        let Some((descriptor, rest)) = descriptors.split_first() else {
            return Vec::new();
        };

        let mut buckets: Vec<(Value, Vec<Model>)> = Vec::new();
        for record in records {
            let value = record.get_json(&descriptor.field).unwrap_or(Value::Null);
            match buckets.iter_mut().find(|(key, _)| *key == value) {
                Some((_, members)) => members.push(record.clone()),
                None => buckets.push((value, vec![record.clone()])),
            }
        }

        buckets
            .into_iter()
            .map(|(value, members)| {
                let aggregates = registry.compute(&descriptor.aggregates, &members);
                let items = if rest.is_empty() {
                    members.iter().cloned().map(GroupItem::Record).collect()
                } else {
                    self.group(&members, rest, registry)
                        .into_iter()
                        .map(GroupItem::Group)
                        .collect()
                };
                let mut group = Group::new(descriptor.field.clone(), value, items)
                    .with_aggregates(aggregates);
                group.has_subgroups = !rest.is_empty();
                group
            })
            .collect()
    }
}
