//! SQLite persistence for the field catalog, document types, documents, and field values.
//!
//! Every function takes a borrowed [`Connection`]; callers that need atomicity pass a
//! `Transaction`, which derefs to one. Ids are stored as hyphenated UUID text and timestamps
//! as RFC 3339 UTC strings with microsecond precision, so lexical order is chronological.

pub mod document_types;
pub mod documents;
pub mod fields;
pub mod schema;
pub mod values;

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::envelope::{Projections, ValueEnvelope};
use crate::errors::{EngineError, EngineResult};

pub use schema::create_schema;

/// A custom field definition. `config` is the canonical JSON of the parsed config model.
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomField {
    pub id: Uuid,
    pub name: String,
    pub type_id: String,
    pub config: Value,
    pub owner: String,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentTypeField {
    pub field_id: Uuid,
    pub name: String,
    pub type_id: String,
    pub position: u32,
}

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentType {
    pub id: Uuid,
    pub name: String,
    pub owner: String,
    /// Bound fields ordered by position.
    pub fields: Vec<DocumentTypeField>,
    pub created_at: String,
}

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub document_type_id: Option<Uuid>,
    pub title: String,
    pub owner: String,
    pub created_at: String,
}

/// One `custom_field_values` row as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub document_id: Uuid,
    pub field_id: Uuid,
    pub envelope: ValueEnvelope,
    pub projections: Projections,
    pub created_at: String,
    pub updated_at: String,
}

/// Current time in the stored timestamp layout.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_uuid(raw: &str) -> EngineResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| EngineError::Other {
        message: format!("stored id '{raw}' is not a UUID: {err}").into(),
    })
}

pub(crate) fn parse_optional_uuid(raw: Option<String>) -> EngineResult<Option<Uuid>> {
    raw.as_deref().map(parse_uuid).transpose()
}

/// Renders `?, ?, ?` for an `IN` list of `count` parameters.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// True when `table` exists in the main schema.
pub fn table_exists(conn: &Connection, table: &str) -> EngineResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
