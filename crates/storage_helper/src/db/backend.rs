//! SQLite-backed storage strategy.
//!
//! # Responsibility
//! - Implement the storage contract over `storage_records`.
//! - Implement the extended database capabilities (bulk delete, predicate
//!   delete, reset).
//!
//! # Invariants
//! - Every mutation runs inside exactly one immediate write transaction.
//! - Save upserts; a key never maps to more than one row.
//! - A row with a null or empty payload reads as not found.

use super::{open_connection, RecordFilter};
use crate::codec::Encodable;
use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, ManagerError, StorageError, StorageResult};
use crate::logging::{display_key, StorageLogger};
use crate::strategy::{validate_key, DatabaseCapabilities, StorageStrategy};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};

const MODULE: &str = "database";

const UPSERT_SQL: &str = "INSERT INTO storage_records (key, data, updated_at)
     VALUES (?1, ?2, CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER))
     ON CONFLICT(key) DO UPDATE SET
        data = excluded.data,
        updated_at = excluded.updated_at;";

/// Storage strategy persisting records in an embedded SQLite database.
pub struct DatabaseBackend {
    conn: Mutex<Connection>,
    logger: StorageLogger,
}

impl DatabaseBackend {
    /// Opens the database described by `config`.
    ///
    /// # Errors
    /// - `DatabaseError::InitializationFailed` when SQLite cannot open the
    ///   database.
    /// - `DatabaseError::MigrationRequired` / `SchemaValidationFailed` when
    ///   the on-disk schema is unusable.
    pub fn open(config: &DatabaseConfig, logger: StorageLogger) -> StorageResult<Self> {
        let conn = open_connection(config, &logger)?;
        Ok(Self::from_connection(conn, logger))
    }

    /// Wraps an already bootstrapped connection.
    pub fn from_connection(conn: Connection, logger: StorageLogger) -> Self {
        Self {
            conn: Mutex::new(conn),
            logger,
        }
    }

    fn connection(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            self.logger.error(format_args!(
                "event=db_lock module={MODULE} status=error error_code=lock_poisoned"
            ));
            ManagerError::ConcurrencyError.into()
        })
    }

    fn bulk_delete<F>(&self, event: &str, op: F) -> StorageResult<usize>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<usize>,
    {
        let mut conn = self.connection()?;
        match in_write_transaction(&mut conn, op) {
            Ok(removed) => {
                self.logger.info(format_args!(
                    "event={event} module={MODULE} status=ok removed={removed}"
                ));
                Ok(removed)
            }
            Err(err) => {
                self.logger.error(format_args!(
                    "event={event} module={MODULE} status=error error_code=transaction_failed error={err}"
                ));
                Err(transaction_failed(err))
            }
        }
    }
}

impl StorageStrategy for DatabaseBackend {
    fn save(&self, item: &dyn Encodable, key: &str) -> StorageResult<()> {
        validate_key(key, MODULE, &self.logger)?;

        let data = match item.encode() {
            Ok(data) => data,
            Err(err) => {
                self.logger.error(format_args!(
                    "event=storage_save module={MODULE} status=error error_code=encoding_failed key={} error={err}",
                    display_key(key)
                ));
                return Err(transaction_failed(err));
            }
        };

        let mut conn = self.connection()?;
        let outcome = in_write_transaction(&mut conn, |tx| {
            tx.execute(UPSERT_SQL, params![key, data])
        });
        if let Err(err) = outcome {
            self.logger.error(format_args!(
                "event=storage_save module={MODULE} status=error error_code=transaction_failed key={} error={err}",
                display_key(key)
            ));
            return Err(transaction_failed(err));
        }

        self.logger.info(format_args!(
            "event=storage_save module={MODULE} status=ok key={}",
            display_key(key)
        ));
        Ok(())
    }

    fn fetch_payload(&self, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key, MODULE, &self.logger)?;

        let conn = self.connection()?;
        let payload = conn
            .query_row(
                "SELECT data FROM storage_records WHERE key = ?1;",
                [key],
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional();

        match payload {
            Ok(Some(Some(data))) if !data.is_empty() => Ok(data),
            Ok(Some(_)) => {
                self.logger.error(format_args!(
                    "event=storage_fetch module={MODULE} status=not_found reason=empty_payload key={}",
                    display_key(key)
                ));
                Err(DatabaseError::ObjectNotFound(key.to_string()).into())
            }
            Ok(None) => {
                self.logger.warning(format_args!(
                    "event=storage_fetch module={MODULE} status=not_found key={}",
                    display_key(key)
                ));
                Err(DatabaseError::ObjectNotFound(key.to_string()).into())
            }
            Err(err) => {
                self.logger.error(format_args!(
                    "event=storage_fetch module={MODULE} status=error error_code=query_failed key={} error={err}",
                    display_key(key)
                ));
                Err(transaction_failed(err))
            }
        }
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let mut conn = self.connection()?;
        match record_exists(&conn, key) {
            Ok(true) => {}
            Ok(false) => {
                self.logger.warning(format_args!(
                    "event=storage_delete module={MODULE} status=skipped reason=not_found key={}",
                    display_key(key)
                ));
                return Ok(());
            }
            Err(err) => {
                self.logger.error(format_args!(
                    "event=storage_delete module={MODULE} status=error error_code=query_failed key={} error={err}",
                    display_key(key)
                ));
                return Err(transaction_failed(err));
            }
        }

        let outcome = in_write_transaction(&mut conn, |tx| {
            tx.execute("DELETE FROM storage_records WHERE key = ?1;", [key])
        });
        if let Err(err) = outcome {
            self.logger.error(format_args!(
                "event=storage_delete module={MODULE} status=error error_code=transaction_failed key={} error={err}",
                display_key(key)
            ));
            return Err(transaction_failed(err));
        }

        self.logger.info(format_args!(
            "event=storage_delete module={MODULE} status=ok key={}",
            display_key(key)
        ));
        Ok(())
    }

    fn logger(&self) -> StorageLogger {
        self.logger.clone()
    }

    fn database_capabilities(self: Arc<Self>) -> Option<Arc<dyn DatabaseCapabilities>> {
        Some(self)
    }
}

impl DatabaseCapabilities for DatabaseBackend {
    fn delete_multiple(&self, keys: &[&str]) -> StorageResult<usize> {
        self.bulk_delete("storage_delete_multiple", |tx| {
            let mut stmt = tx.prepare("DELETE FROM storage_records WHERE key = ?1;")?;
            let mut removed = 0;
            for key in keys {
                removed += stmt.execute([key])?;
            }
            Ok(removed)
        })
    }

    fn delete_where(&self, filter: &RecordFilter) -> StorageResult<usize> {
        if let Err(err) = filter.validate() {
            self.logger.error(format_args!(
                "event=storage_delete_where module={MODULE} status=error error_code=invalid_query error={err}"
            ));
            return Err(err.into());
        }

        let sql = format!("DELETE FROM storage_records WHERE ({});", filter.clause());
        self.bulk_delete("storage_delete_where", |tx| {
            tx.execute(&sql, params_from_iter(filter.params()))
        })
    }

    fn reset(&self) -> StorageResult<usize> {
        self.bulk_delete("storage_reset", |tx| {
            tx.execute("DELETE FROM storage_records;", [])
        })
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        let conn = self.connection()?;
        record_exists(&conn, key).map_err(|err| {
            self.logger.error(format_args!(
                "event=storage_contains module={MODULE} status=error error_code=query_failed key={} error={err}",
                display_key(key)
            ));
            transaction_failed(err)
        })
    }

    fn count(&self) -> StorageResult<usize> {
        let conn = self.connection()?;
        let counted = conn
            .query_row("SELECT COUNT(*) FROM storage_records;", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(transaction_failed)
            .and_then(checked_count);
        counted.map_err(|err| {
            self.logger.error(format_args!(
                "event=storage_count module={MODULE} status=error error_code=query_failed error={err}"
            ));
            err
        })
    }
}

fn in_write_transaction<T, F>(conn: &mut Connection, op: F) -> rusqlite::Result<T>
where
    F: FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = op(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn record_exists(conn: &Connection, key: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM storage_records WHERE key = ?1);",
        [key],
        |row| row.get::<_, i64>(0),
    )
    .map(|exists| exists == 1)
}

fn checked_count(raw: i64) -> StorageResult<usize> {
    usize::try_from(raw).map_err(transaction_failed)
}

fn transaction_failed<E>(err: E) -> StorageError
where
    E: Error + Send + Sync + 'static,
{
    DatabaseError::TransactionFailed(Box::new(err)).into()
}
