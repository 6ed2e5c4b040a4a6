//! Schema versioning tracked in `PRAGMA user_version`.
//!
//! | Version | Change                                                                   |
//! |---------|--------------------------------------------------------------------------|
//! | 1       | Base schema: catalog tables, envelope values, generated projections      |
//! | 2       | Legacy `custom_field_instances` rows converted to envelopes, table dropped |

mod legacy;

use rusqlite::Connection;
use serde::Serialize;

use crate::errors::EngineResult;
use crate::registry::TypeRegistry;
use crate::store::schema::{self, configure_connection};

pub use legacy::{LegacyIssue, LegacyReport, legacy_column, revert_legacy};

pub const BASE_VERSION: i64 = 1;
pub const CURRENT_VERSION: i64 = 2;

/// What a call to [`run`] did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub from_version: i64,
    pub to_version: i64,
    /// Present when the legacy value table was found and converted.
    pub legacy: Option<LegacyReport>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.from_version == self.to_version
    }
}

pub fn schema_version(conn: &Connection) -> EngineResult<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

pub(crate) fn set_schema_version(conn: &Connection, version: i64) -> EngineResult<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Brings the database to [`CURRENT_VERSION`]. Each step runs in its own transaction.
pub fn run(conn: &mut Connection, registry: &TypeRegistry) -> EngineResult<MigrationReport> {
    configure_connection(conn)?;
    let from_version = schema_version(conn)?;
    let mut report = MigrationReport {
        from_version,
        to_version: from_version,
        legacy: None,
    };

    if from_version < BASE_VERSION {
        let tx = conn.transaction()?;
        schema::create_schema(&tx)?;
        set_schema_version(&tx, BASE_VERSION)?;
        tx.commit()?;
        report.to_version = BASE_VERSION;
        log::info!("schema migrated to version {BASE_VERSION}");
    }

    if report.to_version < CURRENT_VERSION {
        let tx = conn.transaction()?;
        report.legacy = legacy::convert(&tx, registry)?;
        set_schema_version(&tx, CURRENT_VERSION)?;
        tx.commit()?;
        report.to_version = CURRENT_VERSION;
        log::info!("schema migrated to version {CURRENT_VERSION}");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        let registry = TypeRegistry::with_builtin_types();
        let report = run(&mut conn, &registry).unwrap();
        assert_eq!(report.from_version, 0);
        assert_eq!(report.to_version, CURRENT_VERSION);
        assert!(report.legacy.is_none());
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn rerun_is_a_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        let registry = TypeRegistry::with_builtin_types();
        run(&mut conn, &registry).unwrap();
        let report = run(&mut conn, &registry).unwrap();
        assert!(report.is_noop());
    }
}
