use rusqlite::Connection;

use crate::errors::EngineResult;

/// Base schema. Projection columns are `STORED` generated columns over `value_json`, so they
/// are recomputed by SQLite on every write and are a pure function of the envelope.
pub const BASE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS custom_fields (
    id          TEXT PRIMARY KEY NOT NULL,
    name        TEXT NOT NULL,
    type_id     TEXT NOT NULL,
    config      TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(config)),
    owner       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    deleted_at  TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_custom_fields_owner_name
    ON custom_fields(owner, name) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS document_types (
    id          TEXT PRIMARY KEY NOT NULL,
    name        TEXT NOT NULL,
    owner       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (owner, name)
);

CREATE TABLE IF NOT EXISTS documents (
    id                TEXT PRIMARY KEY NOT NULL,
    document_type_id  TEXT REFERENCES document_types(id) ON DELETE SET NULL,
    title             TEXT NOT NULL DEFAULT '',
    owner             TEXT NOT NULL,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(document_type_id);
CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(created_at, id);

CREATE TABLE IF NOT EXISTS document_type_custom_field (
    document_type_id  TEXT NOT NULL REFERENCES document_types(id) ON DELETE CASCADE,
    custom_field_id   TEXT NOT NULL REFERENCES custom_fields(id) ON DELETE CASCADE,
    position          INTEGER NOT NULL CHECK (position >= 0),
    PRIMARY KEY (document_type_id, custom_field_id),
    UNIQUE (document_type_id, position)
);

CREATE TABLE IF NOT EXISTS custom_field_values (
    document_id     TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    field_id        TEXT NOT NULL REFERENCES custom_fields(id) ON DELETE CASCADE,
    value_json      TEXT NOT NULL CHECK (json_valid(value_json)),
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    value_text      TEXT GENERATED ALWAYS AS (json_extract(value_json, '$.sortable')) STORED,
    value_numeric   REAL GENERATED ALWAYS AS (
        CASE WHEN json_type(value_json, '$.raw') IN ('integer', 'real')
             THEN json_extract(value_json, '$.raw') END
    ) STORED,
    value_date      TEXT GENERATED ALWAYS AS (
        CASE WHEN json_type(value_json, '$.raw') = 'text'
                  AND json_extract(value_json, '$.raw') GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]*'
             THEN date(json_extract(value_json, '$.raw')) END
    ) STORED,
    value_datetime  TEXT GENERATED ALWAYS AS (
        CASE WHEN json_extract(value_json, '$.sortable')
                  GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]T[0-9][0-9]:[0-9][0-9]:[0-9][0-9].[0-9][0-9][0-9][0-9][0-9][0-9]Z'
             THEN replace(rtrim(json_extract(value_json, '$.sortable'), 'Z'), 'T', ' ') END
    ) STORED,
    value_boolean   INTEGER GENERATED ALWAYS AS (
        CASE json_type(value_json, '$.raw') WHEN 'true' THEN 1 WHEN 'false' THEN 0 END
    ) STORED,
    PRIMARY KEY (document_id, field_id)
);

CREATE INDEX IF NOT EXISTS idx_cfv_field_text ON custom_field_values(field_id, value_text);
CREATE INDEX IF NOT EXISTS idx_cfv_field_numeric ON custom_field_values(field_id, value_numeric);
CREATE INDEX IF NOT EXISTS idx_cfv_field_date ON custom_field_values(field_id, value_date);
CREATE INDEX IF NOT EXISTS idx_cfv_field_datetime ON custom_field_values(field_id, value_datetime);
CREATE INDEX IF NOT EXISTS idx_cfv_field_boolean ON custom_field_values(field_id, value_boolean);
"#;

/// Column-per-type layout that predates the JSON envelope. Only the migrations touch it.
pub const LEGACY_VALUES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS custom_field_instances (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id        TEXT NOT NULL,
    field_id           TEXT NOT NULL,
    value_text         TEXT,
    value_bool         INTEGER,
    value_url          TEXT,
    value_date         TEXT,
    value_int          INTEGER,
    value_float        REAL,
    value_monetary     TEXT,
    value_select       TEXT,
    value_multiselect  TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    UNIQUE (document_id, field_id)
);
"#;

/// Connection pragmas every engine connection needs.
pub fn configure_connection(conn: &Connection) -> EngineResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

pub fn create_schema(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch(BASE_SCHEMA)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projections(conn: &Connection, value_json: &str) -> (Option<String>, Option<f64>, Option<String>, Option<String>, Option<i64>) {
        conn.execute("DELETE FROM custom_field_values", []).unwrap();
        conn.execute(
            "INSERT INTO custom_field_values (document_id, field_id, value_json, created_at, updated_at)
             VALUES ('d', 'f', ?1, 't', 't')",
            [value_json],
        )
        .unwrap();
        conn.query_row(
            "SELECT value_text, value_numeric, value_date, value_datetime, value_boolean FROM custom_field_values",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .unwrap()
    }

    fn scratch() -> Connection {
        // Foreign keys stay off so projection tests need no parent rows.
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "OFF").unwrap();
        create_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = scratch();
        create_schema(&conn).unwrap();
    }

    #[test]
    fn numeric_projection() {
        let conn = scratch();
        let (text, numeric, date, datetime, boolean) =
            projections(&conn, r#"{"raw":22.9,"sortable":"22.90","metadata":{"currency":"EUR"}}"#);
        assert_eq!(text.as_deref(), Some("22.90"));
        assert_eq!(numeric, Some(22.9));
        assert!(date.is_none() && datetime.is_none() && boolean.is_none());
    }

    #[test]
    fn date_and_datetime_projections() {
        let conn = scratch();
        let (_, _, date, datetime, _) = projections(&conn, r#"{"raw":"2024-06-15","sortable":"2024-06-15","metadata":{}}"#);
        assert_eq!(date.as_deref(), Some("2024-06-15"));
        assert!(datetime.is_none());

        let (_, _, date, datetime, _) = projections(
            &conn,
            r#"{"raw":"2024-06-15T10:30:00.25Z","sortable":"2024-06-15T10:30:00.250000Z","metadata":{}}"#,
        );
        assert_eq!(date.as_deref(), Some("2024-06-15"));
        assert_eq!(datetime.as_deref(), Some("2024-06-15 10:30:00.250000"));
    }

    #[test]
    fn date_functions_only_see_iso_text() {
        let conn = scratch();
        for raw in ["now", "2460000", "+1 day", "tomorrow"] {
            let value_json = serde_json::json!({"raw": raw, "sortable": raw, "metadata": {}}).to_string();
            let (text, _, date, datetime, _) = projections(&conn, &value_json);
            assert_eq!(text.as_deref(), Some(raw));
            assert!(date.is_none(), "{raw}");
            assert!(datetime.is_none(), "{raw}");
        }
    }

    #[test]
    fn lowercased_timestamps_do_not_project_as_datetimes() {
        let conn = scratch();
        let (_, _, _, datetime, _) = projections(
            &conn,
            r#"{"raw":"2024-06-15T10:30:00.000000Z","sortable":"2024-06-15t10:30:00.000000z","metadata":{}}"#,
        );
        assert!(datetime.is_none());
    }

    #[test]
    fn boolean_projection() {
        let conn = scratch();
        let (_, numeric, _, _, boolean) = projections(&conn, r#"{"raw":true,"sortable":"1","metadata":{}}"#);
        assert_eq!(boolean, Some(1));
        assert!(numeric.is_none());
        let (_, _, _, _, boolean) = projections(&conn, r#"{"raw":false,"sortable":"0","metadata":{}}"#);
        assert_eq!(boolean, Some(0));
    }

    #[test]
    fn empty_envelope_has_no_projections() {
        let conn = scratch();
        let row = projections(&conn, r#"{"raw":null,"sortable":null,"metadata":{}}"#);
        assert_eq!(row, (None, None, None, None, None));
    }
}
