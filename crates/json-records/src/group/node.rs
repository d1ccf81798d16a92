use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::GroupError;
use crate::model::Model;

/// Aggregate results keyed by field, then by aggregate kind.
pub type GroupAggregates = IndexMap<String, IndexMap<String, Value>>;

#[derive(Debug, Clone, PartialEq)]
pub enum GroupItem {
    Record(Model),
    Group(Group),
}

impl GroupItem {
    pub fn as_record(&self) -> Option<&Model> {
        match self {
            Self::Record(model) => Some(model),
            Self::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(group) => Some(group),
            Self::Record(_) => None,
        }
    }
}

/// A grouping node: the records (or subgroups) sharing `value` in `field`.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub field: String,
    pub value: Value,
    pub has_subgroups: bool,
    pub items: Vec<GroupItem>,
    pub aggregates: GroupAggregates,
    /// Created locally to hold an uncommitted insert; pruned once empty.
    pub(crate) synthetic: bool,
}

impl Group {
    /// Builds a group; `has_subgroups` follows from the first item.
    pub fn new(field: impl Into<String>, value: Value, items: Vec<GroupItem>) -> Self {
        let has_subgroups = matches!(items.first(), Some(GroupItem::Group(_)));
        Self {
            field: field.into(),
            value,
            has_subgroups,
            items,
            aggregates: GroupAggregates::new(),
            synthetic: false,
        }
    }

    pub fn with_aggregates(mut self, aggregates: GroupAggregates) -> Self {
        self.aggregates = aggregates;
        self
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Leaf records beneath this group, in tree order.
    pub fn leaves(&self) -> Vec<Model> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    pub(crate) fn collect_leaves(&self, out: &mut Vec<Model>) {
        for item in &self.items {
            match item {
                GroupItem::Record(model) => out.push(model.clone()),
                GroupItem::Group(group) => group.collect_leaves(out),
            }
        }
    }

    /// Parses a `{field, value, items, hasSubgroups, aggregates}` object,
    /// wrapping leaf items with `make`.
    pub(crate) fn from_json(
        value: Value,
        make: &mut dyn FnMut(Value) -> Model,
    ) -> Result<Self, GroupError> {
        let Value::Object(mut map) = value else {
            return Err(GroupError::Malformed("group must be an object".into()));
        };
        let field = match map.remove("field") {
            Some(Value::String(field)) => field,
            _ => return Err(GroupError::Malformed("group is missing `field`".into())),
        };
        let group_value = map.remove("value").unwrap_or(Value::Null);
        let has_subgroups = map
            .remove("hasSubgroups")
            .and_then(|flag| flag.as_bool())
            .unwrap_or(false);
        let aggregates = match map.remove("aggregates") {
            Some(Value::Object(aggregates)) => parse_aggregates(aggregates),
            _ => GroupAggregates::new(),
        };
        let raw_items = match map.remove("items") {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => Vec::new(),
            Some(_) => {
                return Err(GroupError::Malformed(format!(
                    "items of group `{field}` must be an array"
                )))
            }
        };

        let mut items = Vec::with_capacity(raw_items.len());
        for raw in raw_items {
            if has_subgroups {
                items.push(GroupItem::Group(Group::from_json(raw, make)?));
            } else {
                items.push(GroupItem::Record(make(raw)));
            }
        }

        Ok(Self {
            field,
            value: group_value,
            has_subgroups,
            items,
            aggregates,
            synthetic: false,
        })
    }

    pub(crate) fn settle(&mut self) {
        self.synthetic = false;
        for item in &mut self.items {
            if let GroupItem::Group(group) = item {
                group.settle();
            }
        }
    }
}

fn parse_aggregates(raw: Map<String, Value>) -> GroupAggregates {
    let mut aggregates = GroupAggregates::new();
    for (field, kinds) in raw {
        if let Value::Object(kinds) = kinds {
            aggregates.insert(field, kinds.into_iter().collect());
        }
    }
    aggregates
}
