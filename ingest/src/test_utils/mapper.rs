use config::shared::DeduplicationConfig;

use crate::error::IngestResult;
use crate::stages::writer::FragmentMapper;
use crate::types::{FragmentRow, Record, WriteFragment};

/// Writes one row per record holding only its key, into the default deduplication table.
///
/// Keeps tests independent of the information mapping while still feeding deduplication.
#[derive(Debug, Clone)]
pub struct KeyOnlyMapper {
    table: String,
    column: String,
}

impl KeyOnlyMapper {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl Default for KeyOnlyMapper {
    fn default() -> Self {
        let dedup = DeduplicationConfig::default();
        Self::new(dedup.table, dedup.column)
    }
}

impl FragmentMapper for KeyOnlyMapper {
    fn map(&self, record: &Record) -> IngestResult<WriteFragment> {
        let mut fragment = WriteFragment::new();
        fragment.push_row(
            &self.table,
            FragmentRow::new().value(self.column.as_str(), record.uid()),
        );

        Ok(fragment)
    }
}

/// Writes a key row to `primary` and a payload row to `secondary`, for multi-table commits.
#[derive(Debug, Clone)]
pub struct TwoTableMapper {
    pub primary: String,
    pub secondary: String,
}

impl FragmentMapper for TwoTableMapper {
    fn map(&self, record: &Record) -> IngestResult<WriteFragment> {
        let mut fragment = WriteFragment::new();
        fragment.push_row(
            &self.primary,
            FragmentRow::new().value("information_id", record.uid()),
        );
        fragment.push_row(
            &self.secondary,
            FragmentRow::new()
                .value("information_id", record.uid())
                .value("data", serde_json::Value::Object(record.data.clone())),
        );

        Ok(fragment)
    }
}
