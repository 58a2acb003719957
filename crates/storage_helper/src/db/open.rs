//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections from a `DatabaseConfig`.
//! - Configure connection settings required by the backend.
//! - Trigger schema migrations and validate the record table before
//!   returning a usable connection.
//!
//! # Invariants
//! - Returned connections have migrations fully applied.
//! - Returned connections expose a `storage_records` table with the
//!   expected columns.

use super::migrations::apply_migrations;
use super::RECORD_TABLE;
use crate::config::{DatabaseConfig, DatabaseLocation};
use crate::error::DatabaseError;
use crate::logging::StorageLogger;
use rusqlite::{Connection, OpenFlags};
use std::time::Instant;

const REQUIRED_COLUMNS: &[&str] = &["key", "data", "updated_at"];

/// Opens the configured database and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
///
/// # Errors
/// - `InitializationFailed` when SQLite cannot open or configure the file.
/// - `MigrationRequired` / `SchemaValidationFailed` from schema checks.
pub fn open_connection(
    config: &DatabaseConfig,
    logger: &StorageLogger,
) -> Result<Connection, DatabaseError> {
    let started_at = Instant::now();
    let mode = match config.location {
        DatabaseLocation::InMemory => "memory",
        DatabaseLocation::File(_) => "file",
    };
    logger.info(format_args!(
        "event=db_open module=db status=start mode={mode} read_only={}",
        config.read_only
    ));

    let flags = if config.read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        OpenFlags::default()
    };
    let opened = match &config.location {
        DatabaseLocation::InMemory => Connection::open_in_memory_with_flags(flags),
        DatabaseLocation::File(path) => Connection::open_with_flags(path, flags),
    };

    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            logger.error(format_args!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
                started_at.elapsed().as_millis()
            ));
            return Err(DatabaseError::InitializationFailed(Box::new(err)));
        }
    };

    match bootstrap_connection(&mut conn, config) {
        Ok(()) => {
            logger.info(format_args!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            ));
            Ok(conn)
        }
        Err(err) => {
            logger.error(format_args!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
                started_at.elapsed().as_millis()
            ));
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    config: &DatabaseConfig,
) -> Result<(), DatabaseError> {
    conn.busy_timeout(config.busy_timeout)
        .map_err(|err| DatabaseError::InitializationFailed(Box::new(err)))?;
    apply_migrations(conn, config.read_only)?;
    validate_schema(conn)
}

fn validate_schema(conn: &Connection) -> Result<(), DatabaseError> {
    let columns = table_columns(conn, RECORD_TABLE)
        .map_err(|err| DatabaseError::InitializationFailed(Box::new(err)))?;
    if columns.is_empty() {
        return Err(DatabaseError::SchemaValidationFailed(format!(
            "table `{RECORD_TABLE}` does not exist"
        )));
    }

    for required in REQUIRED_COLUMNS {
        if !columns.iter().any(|column| column.as_str() == *required) {
            return Err(DatabaseError::SchemaValidationFailed(format!(
                "table `{RECORD_TABLE}` is missing column `{required}`"
            )));
        }
    }

    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}
