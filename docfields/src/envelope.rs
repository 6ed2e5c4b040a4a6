//! Canonical stored form of a custom field value and the projection columns derived from it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

/// `{raw, sortable, metadata}` as persisted in `custom_field_values.value_json`.
///
/// `raw` is authoritative. `sortable` feeds the `value_text` projection and `metadata`
/// is advisory only; nothing filters on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEnvelope {
    pub raw: Value,
    #[serde(default)]
    pub sortable: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ValueEnvelope {
    pub fn new(raw: impl Into<Value>, sortable: Option<String>) -> Self {
        Self {
            raw: raw.into(),
            sortable,
            metadata: Map::new(),
        }
    }

    /// Envelope written when a value is cleared.
    pub fn empty() -> Self {
        Self {
            raw: Value::Null,
            sortable: None,
            metadata: Map::new(),
        }
    }

    #[inline]
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_null()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Database-computed columns a handler may sort and filter on.
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionColumn {
    ValueText,
    ValueNumeric,
    ValueDate,
    ValueDatetime,
    ValueBoolean,
}

impl ProjectionColumn {
    pub const ALL: [ProjectionColumn; 5] = [
        ProjectionColumn::ValueText,
        ProjectionColumn::ValueNumeric,
        ProjectionColumn::ValueDate,
        ProjectionColumn::ValueDatetime,
        ProjectionColumn::ValueBoolean,
    ];

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProjectionColumn::ValueText => "value_text",
            ProjectionColumn::ValueNumeric => "value_numeric",
            ProjectionColumn::ValueDate => "value_date",
            ProjectionColumn::ValueDatetime => "value_datetime",
            ProjectionColumn::ValueBoolean => "value_boolean",
        }
    }
}

impl std::fmt::Display for ProjectionColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Projection values as read back from a stored row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Projections {
    pub value_text: Option<String>,
    pub value_numeric: Option<f64>,
    pub value_date: Option<String>,
    pub value_datetime: Option<String>,
    pub value_boolean: Option<bool>,
}
