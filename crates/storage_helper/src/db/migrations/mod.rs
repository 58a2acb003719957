//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - A read-only connection is never migrated.

use crate::error::DatabaseError;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_storage_records.sql"),
}];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
///
/// # Errors
/// - `MigrationRequired` when the database schema is newer than this binary,
///   or when migrations are pending on a read-only connection.
/// - `InitializationFailed` when SQLite rejects a migration step.
pub fn apply_migrations(conn: &mut Connection, read_only: bool) -> Result<(), DatabaseError> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest || (current_version < latest && read_only) {
        return Err(DatabaseError::MigrationRequired {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction().map_err(engine_failure)?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql).map_err(engine_failure)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            .map_err(engine_failure)?;
    }
    tx.commit().map_err(engine_failure)?;

    Ok(())
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> Result<u32, DatabaseError> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
        .map_err(engine_failure)
}

fn engine_failure(err: rusqlite::Error) -> DatabaseError {
    DatabaseError::InitializationFailed(Box::new(err))
}
