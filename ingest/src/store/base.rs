use std::collections::HashSet;
use std::future::Future;

use serde_json::Value;

use crate::error::IngestResult;
use crate::types::{JsonRow, TableRows};

/// Number of rows written to one table by a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableWriteCount {
    pub table: String,
    pub rows: u64,
}

/// Store queried by the deduplication stage and written by the transactional writer.
///
/// Implementations hold a connection only for the duration of one call.
pub trait RecordStore {
    /// Returns which of `keys` are already present in `table.column`.
    ///
    /// Must issue a single bulk lookup regardless of the number of keys.
    fn existing_keys(
        &self,
        table: &str,
        column: &str,
        keys: &[String],
    ) -> impl Future<Output = IngestResult<HashSet<String>>> + Send;

    /// Returns the first row of `table` whose `column` equals `value` in text form.
    fn lookup_row(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> impl Future<Output = IngestResult<Option<JsonRow>>> + Send;

    /// Inserts the rows of every table atomically, in the given table order.
    ///
    /// Either every table receives its rows or none does.
    fn insert_rows(
        &self,
        tables: Vec<TableRows>,
    ) -> impl Future<Output = IngestResult<Vec<TableWriteCount>>> + Send;
}

/// Text form of a cell used for key comparisons, matching a Postgres `::text` cast for the
/// scalar types the store deals with. `null` has no text form.
pub fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
