use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::IngestResult;
use crate::stages::BatchTransform;
use crate::store::{RecordStore, TableWriteCount};
use crate::types::{Cell, DeferredLookup, JsonRow, Record, TableRows, WriteFragment};

/// Turns a record into the rows it contributes to each target table.
pub trait FragmentMapper: Send + Sync {
    fn map(&self, record: &Record) -> IngestResult<WriteFragment>;
}

/// Writes the rows derived from a batch to several tables in one transaction.
///
/// Writing happens in two phases. [`map_record`](Self::map_record) derives a fragment from each
/// record through the [`FragmentMapper`]. [`commit`](Self::commit) resolves deferred lookups,
/// groups rows by table in first-seen table order and hands everything to the store as one
/// atomic insert. As a [`BatchTransform`] the writer returns its input unchanged.
#[derive(Debug, Clone)]
pub struct TransactionalMultiTableWriter<S, M> {
    store: S,
    mapper: M,
}

impl<S, M> TransactionalMultiTableWriter<S, M>
where
    S: RecordStore + Send + Sync,
    M: FragmentMapper,
{
    pub fn new(store: S, mapper: M) -> Self {
        Self { store, mapper }
    }

    pub fn map_record(&self, record: &Record) -> IngestResult<WriteFragment> {
        self.mapper.map(record)
    }

    /// Resolves and commits `fragments`. Nothing is written when any step fails.
    pub async fn commit(&self, fragments: Vec<WriteFragment>) -> IngestResult<Vec<TableWriteCount>> {
        let mut lookups: HashMap<DeferredLookup, Value> = HashMap::new();
        let mut tables: Vec<TableRows> = Vec::new();

        for fragment in fragments {
            for (table, rows) in fragment.into_tables() {
                let position = match tables.iter().position(|t| t.table == table) {
                    Some(position) => position,
                    None => {
                        tables.push(TableRows::new(table));
                        tables.len() - 1
                    }
                };

                for row in rows {
                    let mut resolved = JsonRow::new();
                    for (column, cell) in row.into_cells() {
                        let value = match cell {
                            Cell::Value(value) => value,
                            Cell::Lookup(lookup) => self.resolve(lookup, &mut lookups).await?,
                        };
                        resolved.insert(column, value);
                    }
                    tables[position].rows.push(resolved);
                }
            }
        }

        tables.retain(|table| !table.rows.is_empty());
        if tables.is_empty() {
            return Ok(vec![]);
        }

        self.store.insert_rows(tables).await
    }

    /// Resolves `lookup` to the selected column of the first matching row, or `null`.
    ///
    /// Results are cached in `cache` so each distinct lookup hits the store once per batch.
    async fn resolve(
        &self,
        lookup: DeferredLookup,
        cache: &mut HashMap<DeferredLookup, Value>,
    ) -> IngestResult<Value> {
        if let Some(value) = cache.get(&lookup) {
            return Ok(value.clone());
        }

        let row = self
            .store
            .lookup_row(&lookup.table, &lookup.match_column, &lookup.value)
            .await?;
        let value = row
            .and_then(|mut row| row.remove(&lookup.select_column))
            .unwrap_or(Value::Null);
        debug!(table = %lookup.table, value = %lookup.value, resolved = %value, "resolved lookup");

        cache.insert(lookup, value.clone());

        Ok(value)
    }

    /// Maps and commits `batch`, returning the per-table row counts.
    pub async fn write(&self, batch: &[Record]) -> IngestResult<Vec<TableWriteCount>> {
        let fragments = batch
            .iter()
            .map(|record| self.map_record(record))
            .collect::<IngestResult<Vec<_>>>()?;

        self.commit(fragments).await
    }
}

#[async_trait]
impl<S, M> BatchTransform for TransactionalMultiTableWriter<S, M>
where
    S: RecordStore + Send + Sync,
    M: FragmentMapper,
{
    async fn apply_batch(&self, batch: Vec<Record>) -> IngestResult<Vec<Record>> {
        if !batch.is_empty() {
            self.write(&batch).await?;
        }

        Ok(batch)
    }
}
