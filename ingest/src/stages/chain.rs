use tracing::{debug, warn};

use crate::error::IngestResult;
use crate::stages::Stage;
use crate::types::Record;

/// Ordered list of stages applied to every batch.
#[derive(Debug, Clone, Default)]
pub struct StageChain {
    stages: Vec<Stage>,
}

impl StageChain {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Runs every stage in declaration order. The first failing stage aborts the batch.
    pub async fn run(&self, mut batch: Vec<Record>) -> IngestResult<Vec<Record>> {
        for stage in &self.stages {
            let batch_size = batch.len();
            batch = match stage.run(batch).await {
                Ok(batch) => batch,
                Err(err) => {
                    warn!(stage = stage.name(), batch_size, kind = ?err.kind(), "stage failed");
                    return Err(err);
                }
            };
            debug!(stage = stage.name(), batch_size = batch.len(), "stage completed");
        }

        Ok(batch)
    }
}
