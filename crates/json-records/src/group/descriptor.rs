use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AggregateDescriptor {
    pub field: String,
    pub aggregate: String,
}

impl AggregateDescriptor {
    pub fn new(field: impl Into<String>, aggregate: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            aggregate: aggregate.into(),
        }
    }
}

/// One grouping level.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupDescriptor {
    pub field: String,
    #[serde(default)]
    pub aggregates: Vec<AggregateDescriptor>,
}

impl GroupDescriptor {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            aggregates: Vec::new(),
        }
    }

    pub fn with_aggregate(mut self, field: impl Into<String>, aggregate: impl Into<String>) -> Self {
        self.aggregates.push(AggregateDescriptor::new(field, aggregate));
        self
    }
}
