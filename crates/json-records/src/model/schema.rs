use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Per-field declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldSpec {
    /// Value assigned when a record is constructed without this field.
    pub default_value: Option<Value>,
    /// Non-editable fields reject [`Model::set`](super::Model::set).
    pub editable: bool,
}

impl Default for FieldSpec {
    fn default() -> Self {
        Self {
            default_value: None,
            editable: true,
        }
    }
}

impl FieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }
}

/// Shape of the records held by a record set: the identity field and any
/// declared fields.
///
/// Deserializes from `{"id": "id", "fields": {"name": {"defaultValue": ""}}}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelSchema {
    #[serde(rename = "id")]
    id_field: Option<String>,
    fields: IndexMap<String, FieldSpec>,
}

impl ModelSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn id_field(&self) -> Option<&str> {
        self.id_field.as_deref()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn is_editable(&self, name: &str) -> bool {
        self.fields.get(name).map_or(true, |spec| spec.editable)
    }

    /// Identity value that still means "not persisted".
    pub fn default_id(&self) -> Option<&Value> {
        let id_field = self.id_field.as_deref()?;
        self.fields.get(id_field)?.default_value.as_ref()
    }

    pub(crate) fn apply_defaults(&self, map: &mut Map<String, Value>) {
        for (name, spec) in &self.fields {
            if map.contains_key(name) {
                continue;
            }
            if let Some(default) = &spec.default_value {
                map.insert(name.clone(), default.clone());
            }
        }
    }
}
