use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::model::ModelSchema;

type ParseFn = Box<dyn Fn(Value) -> Value>;
type ExtractFn = Box<dyn Fn(&Value) -> Value>;
type TotalFn = Box<dyn Fn(&Value) -> usize>;

/// How a raw transport payload is turned into records.
///
/// Every hook is optional. Without hooks the payload itself is the record
/// array (or the group array under server grouping).
pub struct Schema {
    model: Rc<ModelSchema>,
    parse: Option<ParseFn>,
    data: Option<ExtractFn>,
    groups: Option<ExtractFn>,
    total: Option<TotalFn>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(ModelSchema::default())
    }
}

impl Schema {
    pub fn new(model: ModelSchema) -> Self {
        Self {
            model: Rc::new(model),
            parse: None,
            data: None,
            groups: None,
            total: None,
        }
    }

    /// Transforms the raw payload before anything else reads it.
    pub fn with_parse(mut self, parse: impl Fn(Value) -> Value + 'static) -> Self {
        self.parse = Some(Box::new(parse));
        self
    }

    /// Extracts the record array from the parsed payload.
    pub fn with_data(mut self, data: impl Fn(&Value) -> Value + 'static) -> Self {
        self.data = Some(Box::new(data));
        self
    }

    /// Extracts the group array from the parsed payload (server grouping).
    pub fn with_groups(mut self, groups: impl Fn(&Value) -> Value + 'static) -> Self {
        self.groups = Some(Box::new(groups));
        self
    }

    /// Extracts the server-side total record count.
    pub fn with_total(mut self, total: impl Fn(&Value) -> usize + 'static) -> Self {
        self.total = Some(Box::new(total));
        self
    }

    pub fn model(&self) -> &Rc<ModelSchema> {
        &self.model
    }

    pub(crate) fn parse(&self, raw: Value) -> Value {
        match &self.parse {
            Some(parse) => parse(raw),
            None => raw,
        }
    }

    pub(crate) fn data(&self, payload: &Value) -> Value {
        match &self.data {
            Some(data) => data(payload),
            None => payload.clone(),
        }
    }

    pub(crate) fn groups(&self, payload: &Value) -> Value {
        match &self.groups {
            Some(groups) => groups(payload),
            None => payload.clone(),
        }
    }

    pub(crate) fn total(&self, payload: &Value) -> Option<usize> {
        self.total.as_ref().map(|total| total(payload))
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("model", &self.model)
            .field("parse", &self.parse.is_some())
            .field("data", &self.data.is_some())
            .field("groups", &self.groups.is_some())
            .field("total", &self.total.is_some())
            .finish()
    }
}
