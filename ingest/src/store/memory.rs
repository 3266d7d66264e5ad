use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};
use crate::failpoints::{WRITE_BATCH__AFTER_FIRST_TABLE, ingest_fail_point};
use crate::store::{RecordStore, TableWriteCount, key_text};
use crate::types::{JsonRow, TableRows};

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, Vec<JsonRow>>,
    /// Tables whose inserts fail, for exercising rollback.
    failing_tables: HashSet<String>,
    existing_keys_calls: usize,
    lookup_calls: usize,
}

/// In-memory [`RecordStore`].
///
/// A batch write is staged on a copy of all tables and swapped in only when every table
/// succeeded, which gives the same all-or-nothing outcome as a database transaction. Nothing
/// survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the rows stored in `table`.
    pub async fn rows(&self, table: &str) -> Vec<JsonRow> {
        let inner = self.inner.lock().await;

        inner.tables.get(table).cloned().unwrap_or_default()
    }

    /// Adds rows outside of any batch, such as lookup data or already ingested keys.
    pub async fn seed_rows(&self, table: &str, rows: Vec<JsonRow>) {
        let mut inner = self.inner.lock().await;

        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Makes every following insert into `table` fail.
    pub async fn fail_inserts_into(&self, table: &str) {
        let mut inner = self.inner.lock().await;

        inner.failing_tables.insert(table.to_string());
    }

    pub async fn existing_keys_calls(&self) -> usize {
        self.inner.lock().await.existing_keys_calls
    }

    pub async fn lookup_calls(&self) -> usize {
        self.inner.lock().await.lookup_calls
    }
}

impl RecordStore for MemoryStore {
    async fn existing_keys(
        &self,
        table: &str,
        column: &str,
        keys: &[String],
    ) -> IngestResult<HashSet<String>> {
        let mut inner = self.inner.lock().await;
        inner.existing_keys_calls += 1;

        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let existing = inner
            .tables
            .get(table)
            .into_iter()
            .flatten()
            .filter_map(|row| row.get(column).and_then(key_text))
            .filter(|key| wanted.contains(key.as_str()))
            .collect();

        Ok(existing)
    }

    async fn lookup_row(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> IngestResult<Option<JsonRow>> {
        let mut inner = self.inner.lock().await;
        inner.lookup_calls += 1;

        let row = inner.tables.get(table).and_then(|rows| {
            rows.iter()
                .find(|row| row.get(column).and_then(key_text).as_deref() == Some(value))
                .cloned()
        });

        Ok(row)
    }

    async fn insert_rows(&self, tables: Vec<TableRows>) -> IngestResult<Vec<TableWriteCount>> {
        let mut inner = self.inner.lock().await;

        let mut staged = inner.tables.clone();
        let mut counts = Vec::with_capacity(tables.len());

        for (index, table_rows) in tables.into_iter().enumerate() {
            if inner.failing_tables.contains(&table_rows.table) {
                bail!(
                    ErrorKind::StoreQueryFailed,
                    "Insert into table failed",
                    table_rows.table
                );
            }

            counts.push(TableWriteCount {
                table: table_rows.table.clone(),
                rows: table_rows.rows.len() as u64,
            });
            staged
                .entry(table_rows.table)
                .or_default()
                .extend(table_rows.rows);

            if index == 0 {
                ingest_fail_point(WRITE_BATCH__AFTER_FIRST_TABLE)?;
            }
        }

        inner.tables = staged;

        Ok(counts)
    }
}
