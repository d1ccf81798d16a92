use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::DataSourceError;
use crate::group::{AggregateDescriptor, GroupDescriptor};

/// Declarative data-source configuration.
///
/// ```
/// use json_records::DataSourceOptions;
/// use serde_json::json;
///
/// let options = DataSourceOptions::from_json(&json!({
///     "serverGrouping": true,
///     "group": {"field": "foo", "aggregates": [{"field": "foo", "aggregate": "count"}]}
/// }))
/// .unwrap();
/// assert!(options.is_server_grouped());
/// assert_eq!(options.group[0].aggregates.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSourceOptions {
    /// Groups arrive pre-built from the transport instead of being computed.
    pub server_grouping: bool,
    /// One descriptor per grouping level; a single object is accepted too.
    #[serde(deserialize_with = "one_or_many")]
    pub group: Vec<GroupDescriptor>,
    /// Aggregates computed over the whole flat record set.
    pub aggregate: Vec<AggregateDescriptor>,
}

impl DataSourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(value: &Value) -> Result<Self, DataSourceError> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn with_group(mut self, descriptor: GroupDescriptor) -> Self {
        self.group.push(descriptor);
        self
    }

    pub fn with_aggregate(mut self, descriptor: AggregateDescriptor) -> Self {
        self.aggregate.push(descriptor);
        self
    }

    pub fn server_grouping(mut self, enabled: bool) -> Self {
        self.server_grouping = enabled;
        self
    }

    pub fn is_grouped(&self) -> bool {
        !self.group.is_empty()
    }

    pub fn is_server_grouped(&self) -> bool {
        self.server_grouping && self.is_grouped()
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<GroupDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(GroupDescriptor),
        Many(Vec<GroupDescriptor>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(descriptor) => vec![descriptor],
        OneOrMany::Many(descriptors) => descriptors,
    })
}
