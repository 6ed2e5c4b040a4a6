use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::{DocumentType, DocumentTypeField, parse_uuid};
use crate::errors::{EngineError, EngineResult};

const NAME_CONSTRAINT: &str = "document_types(owner, name)";

pub fn insert_document_type(conn: &Connection, document_type: &DocumentType) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO document_types (id, name, owner, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            document_type.id.to_string(),
            document_type.name,
            document_type.owner,
            document_type.created_at,
        ],
    )
    .map_err(|err| EngineError::from_constraint(err, NAME_CONSTRAINT))?;
    Ok(())
}

pub fn get_document_type(conn: &Connection, id: Uuid) -> EngineResult<Option<DocumentType>> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT name, owner, created_at FROM document_types WHERE id = ?1",
            [id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let Some((name, owner, created_at)) = row else {
        return Ok(None);
    };
    Ok(Some(DocumentType {
        id,
        name,
        owner,
        fields: bound_fields(conn, id)?,
        created_at,
    }))
}

pub fn require_document_type(conn: &Connection, id: Uuid) -> EngineResult<DocumentType> {
    get_document_type(conn, id)?.ok_or_else(|| EngineError::not_found("document type", id))
}

pub fn list_document_types(conn: &Connection, owner: Option<&str>) -> EngineResult<Vec<DocumentType>> {
    let ids: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM document_types WHERE ?1 IS NULL OR owner = ?1 ORDER BY owner, name, id",
        )?;
        let ids = stmt.query_map([owner], |row| row.get(0))?.collect::<rusqlite::Result<Vec<_>>>()?;
        ids
    };
    let mut document_types = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(document_type) = get_document_type(conn, parse_uuid(&id)?)? {
            document_types.push(document_type);
        }
    }
    Ok(document_types)
}

/// Deletes the type and its bindings. Documents of the type keep their values but lose the type.
pub fn delete_document_type(conn: &Connection, id: Uuid) -> EngineResult<bool> {
    let changed = conn.execute("DELETE FROM document_types WHERE id = ?1", [id.to_string()])?;
    Ok(changed > 0)
}

/// Live fields bound to a document type, ordered by position.
pub fn bound_fields(conn: &Connection, document_type_id: Uuid) -> EngineResult<Vec<DocumentTypeField>> {
    let mut stmt = conn.prepare(
        "SELECT b.custom_field_id, f.name, f.type_id, b.position
         FROM document_type_custom_field b
         JOIN custom_fields f ON f.id = b.custom_field_id AND f.deleted_at IS NULL
         WHERE b.document_type_id = ?1
         ORDER BY b.position",
    )?;
    let rows = stmt
        .query_map([document_type_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter()
        .map(|(field_id, name, type_id, position)| {
            Ok(DocumentTypeField {
                field_id: parse_uuid(&field_id)?,
                name,
                type_id,
                position,
            })
        })
        .collect()
}

/// Replaces the binding list; positions become the slice indexes.
pub fn replace_fields(conn: &Connection, document_type_id: Uuid, field_ids: &[Uuid]) -> EngineResult<()> {
    let document_type_id = document_type_id.to_string();
    conn.execute(
        "DELETE FROM document_type_custom_field WHERE document_type_id = ?1",
        [&document_type_id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO document_type_custom_field (document_type_id, custom_field_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, field_id) in field_ids.iter().enumerate() {
        stmt.execute(params![document_type_id, field_id.to_string(), position as i64])
            .map_err(|err| EngineError::from_constraint(err, "document_type_custom_field(document_type_id, custom_field_id)"))?;
    }
    Ok(())
}

/// Appends a binding at `position = count`. Returns the assigned position.
pub fn append_field(conn: &Connection, document_type_id: Uuid, field_id: Uuid) -> EngineResult<u32> {
    let document_type_id = document_type_id.to_string();
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM document_type_custom_field WHERE document_type_id = ?1",
        [&document_type_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO document_type_custom_field (document_type_id, custom_field_id, position) VALUES (?1, ?2, ?3)",
        params![document_type_id, field_id.to_string(), count],
    )
    .map_err(|err| EngineError::from_constraint(err, "document_type_custom_field(document_type_id, custom_field_id)"))?;
    Ok(count)
}

/// Removes one binding and re-densifies the remaining positions. Returns `false` if unbound.
pub fn remove_field(conn: &Connection, document_type_id: Uuid, field_id: Uuid) -> EngineResult<bool> {
    let document_type_id = document_type_id.to_string();
    let changed = conn.execute(
        "DELETE FROM document_type_custom_field WHERE document_type_id = ?1 AND custom_field_id = ?2",
        params![document_type_id, field_id.to_string()],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    compact_positions(conn, &document_type_id)?;
    Ok(true)
}

/// Rewrites positions as `0..n-1` preserving order.
pub(crate) fn compact_positions(conn: &Connection, document_type_id: &str) -> EngineResult<()> {
    let ordered: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT custom_field_id FROM document_type_custom_field WHERE document_type_id = ?1 ORDER BY position",
        )?;
        let ids = stmt
            .query_map([document_type_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids
    };
    let field_ids = ordered.iter().map(|id| parse_uuid(id)).collect::<EngineResult<Vec<_>>>()?;
    replace_fields(conn, parse_uuid(document_type_id)?, &field_ids)
}
