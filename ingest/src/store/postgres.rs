use std::collections::HashSet;

use config::shared::PgConnectionConfig;
use postgres::pool::create_store_pool;
use postgres::records::{fetch_existing_keys, fetch_row, insert_json_rows};
use sqlx::PgPool;
use tracing::debug;

use crate::error::IngestResult;
use crate::failpoints::{WRITE_BATCH__AFTER_FIRST_TABLE, ingest_fail_point};
use crate::store::{RecordStore, TableWriteCount};
use crate::types::{JsonRow, TableRows};

/// Postgres-backed [`RecordStore`].
///
/// Each batch write runs in a single transaction; returning early on any error drops the
/// transaction, which rolls it back.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store with a lazily connected pool of at most `max_connections` connections.
    pub fn new(config: &PgConnectionConfig, max_connections: u32) -> Self {
        Self {
            pool: create_store_pool(config, max_connections),
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl RecordStore for PostgresStore {
    async fn existing_keys(
        &self,
        table: &str,
        column: &str,
        keys: &[String],
    ) -> IngestResult<HashSet<String>> {
        let existing = fetch_existing_keys(&self.pool, table, column, keys).await?;

        Ok(existing.into_iter().collect())
    }

    async fn lookup_row(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> IngestResult<Option<JsonRow>> {
        Ok(fetch_row(&self.pool, table, column, value).await?)
    }

    async fn insert_rows(&self, tables: Vec<TableRows>) -> IngestResult<Vec<TableWriteCount>> {
        let mut tx = self.pool.begin().await?;
        let mut counts = Vec::with_capacity(tables.len());

        for (index, table_rows) in tables.iter().enumerate() {
            let rows = insert_json_rows(&mut tx, &table_rows.table, &table_rows.rows).await?;
            debug!(table = %table_rows.table, rows, "inserted batch rows");

            counts.push(TableWriteCount {
                table: table_rows.table.clone(),
                rows,
            });

            if index == 0 {
                ingest_fail_point(WRITE_BATCH__AFTER_FIRST_TABLE)?;
            }
        }

        tx.commit().await?;

        Ok(counts)
    }
}
