//! Embedded SQLite storage: bootstrap, schema migration and the backend.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the database backend.
//! - Apply schema migrations in deterministic order.
//! - Persist one `storage_records` row per key.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No record is read or written before migrations and schema checks pass.

mod backend;
mod filter;
pub mod migrations;
mod open;

pub use backend::DatabaseBackend;
pub use filter::RecordFilter;
pub use open::open_connection;

/// Table holding one row per stored key.
pub const RECORD_TABLE: &str = "storage_records";
