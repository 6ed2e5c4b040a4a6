use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use uuid::Uuid;

use super::{CustomField, parse_uuid, placeholders};
use crate::errors::{EngineError, EngineResult};

const FIELD_COLUMNS: &str = "id, name, type_id, config, owner, created_at, updated_at";
const NAME_CONSTRAINT: &str = "custom_fields(owner, name)";

type FieldRow = (String, String, String, String, String, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<FieldRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn into_field(row: FieldRow) -> EngineResult<CustomField> {
    let (id, name, type_id, config, owner, created_at, updated_at) = row;
    Ok(CustomField {
        id: parse_uuid(&id)?,
        name,
        type_id,
        config: serde_json::from_str::<Value>(&config)?,
        owner,
        created_at,
        updated_at,
    })
}

pub fn insert_field(conn: &Connection, field: &CustomField) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO custom_fields (id, name, type_id, config, owner, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            field.id.to_string(),
            field.name,
            field.type_id,
            serde_json::to_string(&field.config)?,
            field.owner,
            field.created_at,
            field.updated_at,
        ],
    )
    .map_err(|err| EngineError::from_constraint(err, NAME_CONSTRAINT))?;
    Ok(())
}

/// Live (non-deleted) field by id.
pub fn get_field(conn: &Connection, id: Uuid) -> EngineResult<Option<CustomField>> {
    let row = conn
        .query_row(
            &format!("SELECT {FIELD_COLUMNS} FROM custom_fields WHERE id = ?1 AND deleted_at IS NULL"),
            [id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(into_field).transpose()
}

pub fn require_field(conn: &Connection, id: Uuid) -> EngineResult<CustomField> {
    get_field(conn, id)?.ok_or_else(|| EngineError::not_found("custom field", id))
}

/// Live fields ordered by name, optionally restricted to one owner.
pub fn list_fields(conn: &Connection, owner: Option<&str>) -> EngineResult<Vec<CustomField>> {
    let rows = match owner {
        Some(owner) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FIELD_COLUMNS} FROM custom_fields
                 WHERE deleted_at IS NULL AND owner = ?1 ORDER BY name, id"
            ))?;
            let rows = stmt.query_map([owner], read_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FIELD_COLUMNS} FROM custom_fields WHERE deleted_at IS NULL ORDER BY owner, name, id"
            ))?;
            let rows = stmt.query_map([], read_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
    };
    rows.into_iter().map(into_field).collect()
}

/// Live fields keyed by id. Ids with no live field are absent from the map.
pub fn fields_by_ids(conn: &Connection, ids: &[Uuid]) -> EngineResult<HashMap<Uuid, CustomField>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT {FIELD_COLUMNS} FROM custom_fields WHERE deleted_at IS NULL AND id IN ({})",
        placeholders(ids.len())
    );
    let id_params: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(id_params.iter()), read_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter()
        .map(|row| into_field(row).map(|field| (field.id, field)))
        .collect()
}

/// Persists name, config, and `updated_at`.
pub fn update_field(conn: &Connection, field: &CustomField) -> EngineResult<()> {
    let changed = conn
        .execute(
            "UPDATE custom_fields SET name = ?2, config = ?3, updated_at = MAX(updated_at, ?4)
             WHERE id = ?1 AND deleted_at IS NULL",
            params![
                field.id.to_string(),
                field.name,
                serde_json::to_string(&field.config)?,
                field.updated_at,
            ],
        )
        .map_err(|err| EngineError::from_constraint(err, NAME_CONSTRAINT))?;
    if changed == 0 {
        return Err(EngineError::not_found("custom field", field.id));
    }
    Ok(())
}

/// Marks the field deleted and removes its values and document-type bindings.
/// Returns `false` when no live field had that id.
pub fn soft_delete_field(conn: &Connection, id: Uuid, deleted_at: &str) -> EngineResult<bool> {
    let id = id.to_string();
    let changed = conn.execute(
        "UPDATE custom_fields SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        params![id, deleted_at],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    conn.execute("DELETE FROM custom_field_values WHERE field_id = ?1", [&id])?;

    let bound_types: Vec<String> = {
        let mut stmt =
            conn.prepare("SELECT document_type_id FROM document_type_custom_field WHERE custom_field_id = ?1")?;
        let ids = stmt.query_map([&id], |row| row.get(0))?.collect::<rusqlite::Result<Vec<_>>>()?;
        ids
    };
    conn.execute("DELETE FROM document_type_custom_field WHERE custom_field_id = ?1", [&id])?;
    for document_type_id in bound_types {
        super::document_types::compact_positions(conn, &document_type_id)?;
    }
    Ok(true)
}
