use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::task::JoinError;
use tracing::warn;

use crate::error::{ErrorKind, IngestError, IngestResult};
use crate::stages::{BatchTransform, RecordTransform};
use crate::types::{FieldPath, Record};
use crate::{bail, ingest_error};

/// One sub-stage of a [`ParallelStageGroup`].
#[derive(Clone)]
pub struct ParallelBranch {
    name: String,
    transform: Arc<dyn RecordTransform>,
    owned_fields: Vec<FieldPath>,
}

impl ParallelBranch {
    /// A branch whose whole output record replaces the canonical one.
    pub fn new<T>(name: impl Into<String>, transform: T) -> Self
    where
        T: RecordTransform + 'static,
    {
        Self::from_arc(name, Arc::new(transform))
    }

    pub fn from_arc(name: impl Into<String>, transform: Arc<dyn RecordTransform>) -> Self {
        Self {
            name: name.into(),
            transform,
            owned_fields: vec![],
        }
    }

    /// Restricts the merge to the given fields. Each path is parsed as a [`FieldPath`].
    pub fn owning<I, P>(mut self, paths: I) -> IngestResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        self.owned_fields = paths
            .into_iter()
            .map(|path| path.as_ref().parse())
            .collect::<IngestResult<_>>()?;

        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Runs several per-record sub-stages concurrently on copies of each record and merges their
/// outputs back.
///
/// Every record is handled on its own: each branch gets a deep copy and runs on a blocking
/// worker, and all workers are joined before anything is merged. When every branch succeeded,
/// outputs are merged in declaration order. Branches with owned fields copy only those fields,
/// the others replace the whole record, which must keep its `uid`. If any branch fails or
/// panics that record is dropped from the batch; the batch fails only when every record did.
#[derive(Clone)]
pub struct ParallelStageGroup {
    branches: Vec<ParallelBranch>,
}

impl ParallelStageGroup {
    pub fn new(branches: Vec<ParallelBranch>) -> IngestResult<Self> {
        if branches.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Parallel stage group needs at least one branch"
            );
        }

        Ok(Self { branches })
    }

    pub fn branches(&self) -> &[ParallelBranch] {
        &self.branches
    }

    /// Applies the group to a single record.
    pub async fn apply_record(&self, record: &mut Record) -> IngestResult<()> {
        let handles = self.branches.iter().map(|branch| {
            let transform = branch.transform.clone();
            let mut copy = record.clone();

            tokio::task::spawn_blocking(move || {
                transform.apply(&mut copy)?;
                Ok::<_, IngestError>(copy)
            })
        });
        let results = join_all(handles).await;

        let mut outputs = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for (branch, result) in self.branches.iter().zip(results) {
            match result {
                Ok(Ok(output)) => outputs.push(output),
                Ok(Err(err)) => errors.push(err),
                Err(join_err) => errors.push(worker_failure(branch, join_err)),
            }
        }

        if !errors.is_empty() {
            bail!(
                ErrorKind::ParallelGroupFailed,
                "Parallel stage group failed, record left unchanged",
                record.uid(),
                source: IngestError::from(errors)
            );
        }

        for (branch, output) in self.branches.iter().zip(outputs) {
            merge(branch, output, record)?;
        }

        Ok(())
    }
}

fn worker_failure(branch: &ParallelBranch, err: JoinError) -> IngestError {
    if err.is_panic() {
        ingest_error!(
            ErrorKind::StageWorkerPanic,
            "Parallel stage worker panicked",
            branch.name()
        )
    } else {
        ingest_error!(
            ErrorKind::StageWorkerPanic,
            "Parallel stage worker was cancelled",
            branch.name(),
            source: err
        )
    }
}

fn merge(branch: &ParallelBranch, output: Record, record: &mut Record) -> IngestResult<()> {
    if branch.owned_fields.is_empty() {
        if output.uid() != record.uid() {
            bail!(
                ErrorKind::InvalidData,
                "Parallel stage branch changed the record uid",
                format!("branch {} returned {}", branch.name(), output.uid())
            );
        }

        *record = output;
        return Ok(());
    }

    for path in &branch.owned_fields {
        path.copy(&output, record);
    }

    Ok(())
}

#[async_trait]
impl BatchTransform for ParallelStageGroup {
    async fn apply_batch(&self, batch: Vec<Record>) -> IngestResult<Vec<Record>> {
        let batch_size = batch.len();
        let mut kept = Vec::with_capacity(batch_size);
        let mut errors = Vec::new();

        for mut record in batch {
            match self.apply_record(&mut record).await {
                Ok(()) => kept.push(record),
                Err(err) => {
                    warn!(uid = record.uid(), error = %err, "record dropped by parallel stage group");
                    errors.push(err);
                }
            }
        }

        if batch_size > 0 && kept.is_empty() {
            bail!(
                ErrorKind::ParallelGroupFailed,
                "Parallel stage group failed for every record in the batch",
                format!("{batch_size} records"),
                source: IngestError::from(errors)
            );
        }

        Ok(kept)
    }
}
