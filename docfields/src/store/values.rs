use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::{DocumentTypeField, StoredValue, parse_uuid};
use crate::envelope::{Projections, ValueEnvelope};
use crate::errors::EngineResult;

const VALUE_COLUMNS: &str = "v.document_id, v.field_id, v.value_json, v.created_at, v.updated_at, \
     v.value_text, v.value_numeric, v.value_date, v.value_datetime, v.value_boolean";

struct ValueRow {
    document_id: String,
    field_id: String,
    value_json: String,
    created_at: String,
    updated_at: String,
    projections: Projections,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ValueRow> {
    Ok(ValueRow {
        document_id: row.get(0)?,
        field_id: row.get(1)?,
        value_json: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        projections: Projections {
            value_text: row.get(5)?,
            value_numeric: row.get(6)?,
            value_date: row.get(7)?,
            value_datetime: row.get(8)?,
            value_boolean: row.get(9)?,
        },
    })
}

impl ValueRow {
    fn into_stored(self) -> EngineResult<StoredValue> {
        Ok(StoredValue {
            document_id: parse_uuid(&self.document_id)?,
            field_id: parse_uuid(&self.field_id)?,
            envelope: ValueEnvelope::from_json(&self.value_json)?,
            projections: self.projections,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A stored value together with its binding on the document's type.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub binding: DocumentTypeField,
    pub stored: StoredValue,
}

/// Inserts or replaces the envelope for `(document, field)`.
///
/// `updated_at` never moves backwards, even if the caller's clock does.
pub fn upsert_value(
    conn: &Connection,
    document_id: Uuid,
    field_id: Uuid,
    envelope: &ValueEnvelope,
    now: &str,
) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO custom_field_values (document_id, field_id, value_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT (document_id, field_id) DO UPDATE SET
             value_json = excluded.value_json,
             updated_at = MAX(custom_field_values.updated_at, excluded.updated_at)",
        params![document_id.to_string(), field_id.to_string(), envelope.to_json()?, now],
    )?;
    Ok(())
}

pub fn get_value(conn: &Connection, document_id: Uuid, field_id: Uuid) -> EngineResult<Option<StoredValue>> {
    let row = conn
        .query_row(
            &format!("SELECT {VALUE_COLUMNS} FROM custom_field_values v WHERE v.document_id = ?1 AND v.field_id = ?2"),
            params![document_id.to_string(), field_id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(ValueRow::into_stored).transpose()
}

/// Values of a document restricted to the live fields bound to `document_type_id`, in position order.
/// Values of unbound fields stay in the store but are not returned.
pub fn bound_values(conn: &Connection, document_id: Uuid, document_type_id: Uuid) -> EngineResult<Vec<BoundValue>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VALUE_COLUMNS}, f.name, f.type_id, b.position
         FROM document_type_custom_field b
         JOIN custom_fields f ON f.id = b.custom_field_id AND f.deleted_at IS NULL
         JOIN custom_field_values v ON v.field_id = b.custom_field_id AND v.document_id = ?1
         WHERE b.document_type_id = ?2
         ORDER BY b.position"
    ))?;
    let rows = stmt
        .query_map(params![document_id.to_string(), document_type_id.to_string()], |row| {
            Ok((
                read_row(row)?,
                row.get::<_, String>(10)?,
                row.get::<_, String>(11)?,
                row.get::<_, u32>(12)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(row, name, type_id, position)| {
            let stored = row.into_stored()?;
            Ok(BoundValue {
                binding: DocumentTypeField {
                    field_id: stored.field_id,
                    name,
                    type_id,
                    position,
                },
                stored,
            })
        })
        .collect()
}

/// Every stored value of a field, oldest first, optionally capped at `limit` rows.
pub fn field_values(conn: &Connection, field_id: Uuid, limit: Option<usize>) -> EngineResult<Vec<StoredValue>> {
    let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
    let mut stmt = conn.prepare(&format!(
        "SELECT {VALUE_COLUMNS} FROM custom_field_values v
         WHERE v.field_id = ?1
         ORDER BY v.created_at, v.document_id
         LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(params![field_id.to_string(), limit], read_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(ValueRow::into_stored).collect()
}

pub fn count_field_values(conn: &Connection, field_id: Uuid) -> EngineResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM custom_field_values WHERE field_id = ?1",
        [field_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}
