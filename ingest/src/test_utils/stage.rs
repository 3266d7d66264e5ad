use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};
use crate::stages::{BatchTransform, RecordTransform};
use crate::types::Record;

/// Batch transform keeping a copy of every batch it was handed, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingStage {
    batches: Arc<Mutex<Vec<Vec<Record>>>>,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<Record>> {
        self.batches
            .lock()
            .map(|batches| batches.clone())
            .unwrap_or_default()
    }

    /// The uids of every recorded batch.
    pub fn batch_uids(&self) -> Vec<Vec<String>> {
        self.batches()
            .iter()
            .map(|batch| batch.iter().map(|record| record.uid().to_string()).collect())
            .collect()
    }
}

#[async_trait]
impl BatchTransform for RecordingStage {
    async fn apply_batch(&self, batch: Vec<Record>) -> IngestResult<Vec<Record>> {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(batch.clone());
        }

        Ok(batch)
    }
}

/// Per-record transform failing on the record with the given uid.
#[derive(Debug, Clone)]
pub struct FailOnUid(pub String);

impl RecordTransform for FailOnUid {
    fn apply(&self, record: &mut Record) -> IngestResult<()> {
        if record.uid() == self.0 {
            bail!(ErrorKind::StageFailed, "Record rejected", self.0.clone());
        }

        Ok(())
    }
}
