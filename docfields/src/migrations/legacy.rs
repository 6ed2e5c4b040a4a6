//! Conversion between the column-per-type `custom_field_instances` table and envelope rows.

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params};
use serde::Serialize;
use serde_json::Value;

use super::{BASE_VERSION, set_schema_version};
use crate::envelope::ValueEnvelope;
use crate::errors::EngineResult;
use crate::field_types::type_ids;
use crate::registry::TypeRegistry;
use crate::store::schema::LEGACY_VALUES_SCHEMA;
use crate::store::{parse_uuid, table_exists, values};

const LEGACY_TABLE: &str = "custom_field_instances";

/// A legacy row that could not be converted cleanly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyIssue {
    pub document_id: String,
    pub field_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LegacyReport {
    pub converted: usize,
    /// Rows whose type column held no value.
    pub skipped_empty: usize,
    /// Rows pointing at a missing field or document; not carried over.
    pub orphaned: Vec<LegacyIssue>,
    /// Rows kept verbatim with `metadata.legacy_invalid = true`.
    pub invalid: Vec<LegacyIssue>,
}

/// The legacy column holding values of `type_id`.
pub fn legacy_column(type_id: &str) -> &'static str {
    match type_id {
        type_ids::BOOLEAN => "value_bool",
        type_ids::URL => "value_url",
        type_ids::DATE => "value_date",
        type_ids::INTEGER => "value_int",
        type_ids::NUMBER => "value_float",
        type_ids::MONETARY => "value_monetary",
        type_ids::SELECT => "value_select",
        type_ids::MULTISELECT => "value_multiselect",
        _ => "value_text",
    }
}

struct LegacyRow {
    document_id: String,
    field_id: String,
    type_id: Option<String>,
    config: Option<String>,
    document_exists: bool,
    value: SqlValue,
    created_at: String,
    updated_at: String,
}

/// Reads the column for the field's type as handler input.
fn legacy_input(type_id: &str, value: SqlValue) -> Value {
    match (type_id, value) {
        (_, SqlValue::Null) => Value::Null,
        (type_ids::BOOLEAN, SqlValue::Integer(flag)) => Value::Bool(flag != 0),
        (type_ids::MULTISELECT, SqlValue::Text(text)) => {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
        (_, SqlValue::Integer(number)) => Value::from(number),
        (_, SqlValue::Real(number)) => serde_json::Number::from_f64(number).map_or(Value::Null, Value::Number),
        (_, SqlValue::Text(text)) => Value::String(text),
        (_, SqlValue::Blob(bytes)) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn is_blank(input: &Value) -> bool {
    match input {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn stringify(input: &Value) -> String {
    match input {
        Value::String(text) => text.to_lowercase(),
        other => other.to_string(),
    }
}

fn read_legacy_rows(conn: &Connection) -> EngineResult<Vec<LegacyRow>> {
    let mut stmt = conn.prepare(
        "SELECT i.document_id, i.field_id, f.type_id, f.config, d.id IS NOT NULL,
                i.value_text, i.value_bool, i.value_url, i.value_date, i.value_int, i.value_float,
                i.value_monetary, i.value_select, i.value_multiselect, i.created_at, i.updated_at
         FROM custom_field_instances i
         LEFT JOIN custom_fields f ON f.id = i.field_id AND f.deleted_at IS NULL
         LEFT JOIN documents d ON d.id = i.document_id
         ORDER BY i.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let type_id: Option<String> = row.get(2)?;
            let column_index = match type_id.as_deref().map(legacy_column) {
                Some("value_bool") => 6,
                Some("value_url") => 7,
                Some("value_date") => 8,
                Some("value_int") => 9,
                Some("value_float") => 10,
                Some("value_monetary") => 11,
                Some("value_select") => 12,
                Some("value_multiselect") => 13,
                _ => 5,
            };
            Ok(LegacyRow {
                document_id: row.get(0)?,
                field_id: row.get(1)?,
                type_id,
                config: row.get(3)?,
                document_exists: row.get(4)?,
                value: row.get(column_index)?,
                created_at: row.get(14)?,
                updated_at: row.get(15)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Converts every legacy row through its field's handler, then drops the legacy table.
/// Returns `None` when there is no legacy table.
pub(super) fn convert(conn: &Connection, registry: &TypeRegistry) -> EngineResult<Option<LegacyReport>> {
    if !table_exists(conn, LEGACY_TABLE)? {
        return Ok(None);
    }

    let mut report = LegacyReport::default();
    for row in read_legacy_rows(conn)? {
        let issue = |message: String| LegacyIssue {
            document_id: row.document_id.clone(),
            field_id: row.field_id.clone(),
            message,
        };

        let Some(type_id) = row.type_id.as_deref() else {
            log::warn!("legacy value for unknown field {} skipped", row.field_id);
            report.orphaned.push(issue("field does not exist".to_string()));
            continue;
        };
        if !row.document_exists {
            log::warn!("legacy value for unknown document {} skipped", row.document_id);
            report.orphaned.push(issue("document does not exist".to_string()));
            continue;
        }

        let input = legacy_input(type_id, row.value.clone());
        if is_blank(&input) {
            report.skipped_empty += 1;
            continue;
        }

        let config_json: Value = match row.config.as_deref() {
            Some(raw) => serde_json::from_str(raw)?,
            None => Value::Null,
        };
        let converted = registry
            .validate_config(type_id, &config_json)
            .map_err(|err| err.to_string())
            .and_then(|config| {
                let handler = registry.get(type_id).map_err(|err| err.to_string())?;
                handler.validate(&input, &config)?;
                handler.to_storage(&input, &config)
            });

        let envelope = match converted {
            Ok(envelope) => {
                report.converted += 1;
                envelope
            }
            Err(message) => {
                log::warn!(
                    "legacy value for document {} field {} kept unconverted: {message}",
                    row.document_id,
                    row.field_id
                );
                report.invalid.push(issue(message.clone()));
                let sortable = stringify(&input);
                ValueEnvelope::new(input, Some(sortable))
                    .with_meta("legacy_invalid", true)
                    .with_meta("legacy_error", message)
            }
        };

        let document_id = parse_uuid(&row.document_id)?;
        let field_id = parse_uuid(&row.field_id)?;
        values::upsert_value(conn, document_id, field_id, &envelope, &row.created_at)?;
        // Keep the legacy modification time rather than the creation time.
        conn.execute(
            "UPDATE custom_field_values SET updated_at = MAX(updated_at, ?3) WHERE document_id = ?1 AND field_id = ?2",
            params![row.document_id, row.field_id, row.updated_at],
        )?;
    }

    conn.execute_batch(&format!("DROP TABLE {LEGACY_TABLE};"))?;
    log::info!(
        "converted {} legacy values ({} empty, {} invalid, {} orphaned)",
        report.converted,
        report.skipped_empty,
        report.invalid.len(),
        report.orphaned.len()
    );
    Ok(Some(report))
}

fn monetary_legacy_text(raw: &Value, config: &Value) -> Option<String> {
    let amount = raw.as_f64()?;
    let currency = config.get("currency").and_then(Value::as_str).unwrap_or("EUR");
    let precision = config.get("precision").and_then(Value::as_u64).unwrap_or(2) as usize;
    Some(format!("{currency}{amount:.precision$}"))
}

/// Column value written back for a stored raw value.
fn legacy_value(type_id: &str, raw: &Value, config: &Value) -> SqlValue {
    match (type_id, raw) {
        (_, Value::Null) => SqlValue::Null,
        (type_ids::MONETARY, _) => monetary_legacy_text(raw, config).map_or(SqlValue::Null, SqlValue::Text),
        (type_ids::MULTISELECT, _) => SqlValue::Text(raw.to_string()),
        (_, Value::Bool(flag)) => SqlValue::Integer(i64::from(*flag)),
        (_, Value::Number(number)) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => number.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        (_, Value::String(text)) => SqlValue::Text(text.clone()),
        (_, other) => SqlValue::Text(other.to_string()),
    }
}

/// Best-effort reverse of the legacy conversion: writes `raw` back into the type's column,
/// drops every envelope, and resets the schema version to 1. Metadata is lost.
///
/// Returns the number of legacy rows written.
pub fn revert_legacy(conn: &mut Connection, registry: &TypeRegistry) -> EngineResult<usize> {
    let tx = conn.transaction()?;
    tx.execute_batch(LEGACY_VALUES_SCHEMA)?;

    let rows: Vec<(String, String, String, String, String, String, String)> = {
        let mut stmt = tx.prepare(
            "SELECT v.document_id, v.field_id, f.type_id, f.config, v.value_json, v.created_at, v.updated_at
             FROM custom_field_values v
             JOIN custom_fields f ON f.id = v.field_id
             ORDER BY v.created_at, v.document_id, v.field_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    let mut written = 0;
    for (document_id, field_id, type_id, config, value_json, created_at, updated_at) in rows {
        if !registry.has(&type_id) {
            log::warn!("field {field_id} has unregistered type '{type_id}'; reverting as text");
        }
        let envelope = ValueEnvelope::from_json(&value_json)?;
        if envelope.is_empty() {
            continue;
        }
        let config: Value = serde_json::from_str(&config)?;
        let column = legacy_column(&type_id);
        tx.execute(
            &format!(
                "INSERT INTO custom_field_instances (document_id, field_id, {column}, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![
                document_id,
                field_id,
                legacy_value(&type_id, &envelope.raw, &config),
                created_at,
                updated_at
            ],
        )?;
        written += 1;
    }

    tx.execute("DELETE FROM custom_field_values", [])?;
    set_schema_version(&tx, BASE_VERSION)?;
    tx.commit()?;
    log::info!("reverted {written} values to the legacy layout");
    Ok(written)
}
