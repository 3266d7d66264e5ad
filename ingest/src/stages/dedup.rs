use async_trait::async_trait;
use config::shared::DeduplicationConfig;
use tracing::debug;

use crate::error::IngestResult;
use crate::failpoints::{DEDUPLICATE__BEFORE_LOOKUP, ingest_fail_point};
use crate::stages::BatchTransform;
use crate::store::RecordStore;
use crate::types::Record;

/// Drops records whose `uid` is already persisted in the configured key column.
///
/// Read only: it never writes to the store. An empty batch is returned without touching the
/// store; otherwise exactly one bulk lookup is issued. Surviving records keep their order.
#[derive(Debug, Clone)]
pub struct DeduplicationStage<S> {
    store: S,
    table: String,
    column: String,
}

impl<S> DeduplicationStage<S> {
    pub fn new(store: S, config: &DeduplicationConfig) -> Self {
        Self {
            store,
            table: config.table.clone(),
            column: config.column.clone(),
        }
    }
}

#[async_trait]
impl<S> BatchTransform for DeduplicationStage<S>
where
    S: RecordStore + Send + Sync,
{
    async fn apply_batch(&self, mut batch: Vec<Record>) -> IngestResult<Vec<Record>> {
        if batch.is_empty() {
            return Ok(batch);
        }

        ingest_fail_point(DEDUPLICATE__BEFORE_LOOKUP)?;

        let keys: Vec<String> = batch.iter().map(|record| record.uid().to_string()).collect();
        let existing = self
            .store
            .existing_keys(&self.table, &self.column, &keys)
            .await?;

        let received = batch.len();
        batch.retain(|record| !existing.contains(record.uid()));
        debug!(
            received,
            duplicates = received - batch.len(),
            "deduplicated batch"
        );

        Ok(batch)
    }
}
