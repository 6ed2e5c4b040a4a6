use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::{Document, parse_optional_uuid, parse_uuid};
use crate::errors::{EngineError, EngineResult};

pub fn insert_document(conn: &Connection, document: &Document) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO documents (id, document_type_id, title, owner, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            document.id.to_string(),
            document.document_type_id.map(|id| id.to_string()),
            document.title,
            document.owner,
            document.created_at,
        ],
    )
    .map_err(|err| EngineError::from_constraint(err, "documents(id)"))?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: Uuid) -> EngineResult<Option<Document>> {
    let row: Option<(Option<String>, String, String, String)> = conn
        .query_row(
            "SELECT document_type_id, title, owner, created_at FROM documents WHERE id = ?1",
            [id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;
    row.map(|(document_type_id, title, owner, created_at)| {
        Ok(Document {
            id,
            document_type_id: parse_optional_uuid(document_type_id)?,
            title,
            owner,
            created_at,
        })
    })
    .transpose()
}

pub fn require_document(conn: &Connection, id: Uuid) -> EngineResult<Document> {
    get_document(conn, id)?.ok_or_else(|| EngineError::not_found("document", id))
}

/// Deletes a document; its values go with it through `ON DELETE CASCADE`.
pub fn delete_document(conn: &Connection, id: Uuid) -> EngineResult<bool> {
    let changed = conn.execute("DELETE FROM documents WHERE id = ?1", [id.to_string()])?;
    Ok(changed > 0)
}

/// Loads documents by id, preserving the order of `ids`.
pub fn documents_in_order(conn: &Connection, ids: &[Uuid]) -> EngineResult<Vec<Document>> {
    let mut stmt = conn.prepare(
        "SELECT id, document_type_id, title, owner, created_at FROM documents WHERE id = ?1",
    )?;
    let mut documents = Vec::with_capacity(ids.len());
    for id in ids {
        let row: Option<(String, Option<String>, String, String, String)> = stmt
            .query_row([id.to_string()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .optional()?;
        if let Some((id, document_type_id, title, owner, created_at)) = row {
            documents.push(Document {
                id: parse_uuid(&id)?,
                document_type_id: parse_optional_uuid(document_type_id)?,
                title,
                owner,
                created_at,
            });
        }
    }
    Ok(documents)
}
