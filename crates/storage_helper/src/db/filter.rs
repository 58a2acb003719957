//! Predicate expressions selecting stored records.

use crate::error::DatabaseError;
use rusqlite::types::Value;

/// SQL boolean expression over `storage_records` with positional parameters.
///
/// The clause is evaluated by SQLite as the `WHERE` condition of a delete,
/// so it may reference the `key`, `data` and `updated_at` columns and bind
/// values through `?1`, `?2`, ... placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFilter {
    clause: String,
    params: Vec<Value>,
}

impl RecordFilter {
    pub fn new(clause: impl Into<String>, params: impl IntoIterator<Item = Value>) -> Self {
        Self {
            clause: clause.into(),
            params: params.into_iter().collect(),
        }
    }

    /// Matches keys starting with `prefix` (case-sensitive).
    pub fn key_prefix(prefix: &str) -> Self {
        Self::new(
            "substr(key, 1, length(?1)) = ?1",
            [Value::Text(prefix.to_string())],
        )
    }

    /// Matches records last written before `epoch_ms`.
    pub fn updated_before(epoch_ms: i64) -> Self {
        Self::new("updated_at < ?1", [Value::Integer(epoch_ms)])
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Rejects clauses that cannot be a single boolean expression.
    pub(crate) fn validate(&self) -> Result<(), DatabaseError> {
        let trimmed = self.clause.trim();
        if trimmed.is_empty() {
            return Err(DatabaseError::InvalidQuery(
                "filter clause must not be empty".to_string(),
            ));
        }
        if trimmed.contains(';') {
            return Err(DatabaseError::InvalidQuery(format!(
                "filter clause must be a single expression: `{trimmed}`"
            )));
        }
        Ok(())
    }
}
