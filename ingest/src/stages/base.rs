use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};
use crate::types::Record;

/// Per-record transform. Runs on each record of the batch, in batch order, in place.
pub trait RecordTransform: Send + Sync {
    fn apply(&self, record: &mut Record) -> IngestResult<()>;
}

/// Whole-batch transform. May filter, reorder or replace the records it is handed.
#[async_trait]
pub trait BatchTransform: Send + Sync {
    async fn apply_batch(&self, batch: Vec<Record>) -> IngestResult<Vec<Record>>;
}

/// Adapts a plain function into a [`RecordTransform`].
#[derive(Clone, Copy)]
pub struct FnTransform(pub fn(&mut Record) -> IngestResult<()>);

impl RecordTransform for FnTransform {
    fn apply(&self, record: &mut Record) -> IngestResult<()> {
        (self.0)(record)
    }
}

/// A named step of the pipeline.
///
/// A stage has a per-record slot, a batch slot, or both; the per-record slot runs first. With
/// `preserves_input` set the stage works on a deep copy of the batch and the pipeline continues
/// with the batch as it was before the stage, which is how side-effect-only stages such as the
/// writer leave the records untouched.
#[derive(Clone)]
pub struct Stage {
    name: String,
    record: Option<Arc<dyn RecordTransform>>,
    batch: Option<Arc<dyn BatchTransform>>,
    preserves_input: bool,
}

impl Stage {
    /// Creates a stage, failing with [`ErrorKind::ConfigError`] when both slots are empty.
    pub fn new(
        name: impl Into<String>,
        record: Option<Arc<dyn RecordTransform>>,
        batch: Option<Arc<dyn BatchTransform>>,
    ) -> IngestResult<Self> {
        let name = name.into();
        if record.is_none() && batch.is_none() {
            bail!(
                ErrorKind::ConfigError,
                "Stage defines neither a record nor a batch transform",
                name
            );
        }

        Ok(Self {
            name,
            record,
            batch,
            preserves_input: false,
        })
    }

    pub fn per_record<T>(name: impl Into<String>, transform: T) -> Self
    where
        T: RecordTransform + 'static,
    {
        Self {
            name: name.into(),
            record: Some(Arc::new(transform)),
            batch: None,
            preserves_input: false,
        }
    }

    pub fn per_batch<T>(name: impl Into<String>, transform: T) -> Self
    where
        T: BatchTransform + 'static,
    {
        Self {
            name: name.into(),
            record: None,
            batch: Some(Arc::new(transform)),
            preserves_input: false,
        }
    }

    pub fn preserving_input(mut self, preserves_input: bool) -> Self {
        self.preserves_input = preserves_input;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn preserves_input(&self) -> bool {
        self.preserves_input
    }

    /// Runs the stage on `batch` and returns the batch the next stage receives.
    pub async fn run(&self, batch: Vec<Record>) -> IngestResult<Vec<Record>> {
        if self.preserves_input {
            self.transform(batch.clone()).await?;
            return Ok(batch);
        }

        self.transform(batch).await
    }

    async fn transform(&self, mut batch: Vec<Record>) -> IngestResult<Vec<Record>> {
        if let Some(record) = &self.record {
            for item in batch.iter_mut() {
                record.apply(item)?;
            }
        }

        if let Some(transform) = &self.batch {
            batch = transform.apply_batch(batch).await?;
        }

        Ok(batch)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("record", &self.record.is_some())
            .field("batch", &self.batch.is_some())
            .field("preserves_input", &self.preserves_input)
            .finish()
    }
}
