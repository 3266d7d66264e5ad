use std::sync::Arc;

use config::shared::{BatchConfig, PipelineConfig, StageConfig};
use futures::{Stream, StreamExt, pin_mut};
use tracing::{Instrument, debug, error, info, info_span};

use crate::concurrency::shutdown::{
    ShutdownResult, ShutdownRx, ShutdownTx, create_shutdown_channel,
};
use crate::concurrency::stream::BatchStream;
use crate::error::IngestResult;
use crate::processor::{PriorityProcessorChain, ProcessorLayer, ProcessorRegistry};
use crate::stages::dedup::DeduplicationStage;
use crate::stages::normalize::builtin_transform;
use crate::stages::parallel::{ParallelBranch, ParallelStageGroup};
use crate::stages::writer::{FragmentMapper, TransactionalMultiTableWriter};
use crate::stages::{BatchTransform, Stage, StageChain};
use crate::store::{RecordStore, TableWriteCount};
use crate::types::Record;

/// Outcome of one committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub sequence: u64,
    /// Records handed to the first stage.
    pub received: usize,
    /// Records dropped because their key was already persisted.
    pub duplicates: usize,
    pub written: Vec<TableWriteCount>,
}

impl BatchSummary {
    pub fn rows_written(&self) -> u64 {
        self.written.iter().map(|count| count.rows).sum()
    }
}

/// Counters accumulated over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub batches_committed: u64,
    pub batches_failed: u64,
    pub records_received: u64,
    pub duplicates: u64,
    pub rows_written: u64,
}

impl PipelineStats {
    fn record_summary(&mut self, summary: &BatchSummary) {
        self.batches_committed += 1;
        self.records_received += summary.received as u64;
        self.duplicates += summary.duplicates as u64;
        self.rows_written += summary.rows_written();
    }

    fn record_failure(&mut self, batch_size: usize) {
        self.batches_failed += 1;
        self.records_received += batch_size as u64;
    }
}

/// Drives batches from a record stream through the stages, deduplication and the writer.
///
/// Only one batch is in flight at a time: the next batch is not pulled from the window until the
/// current one has been committed or has failed. A failed batch is logged with its size and cause
/// and dropped, and the pipeline moves on to the next one.
#[derive(Debug)]
pub struct Pipeline<S, M> {
    name: String,
    batch_config: BatchConfig,
    stages: StageChain,
    dedup: DeduplicationStage<S>,
    writer: TransactionalMultiTableWriter<S, M>,
    shutdown_tx: ShutdownTx,
    shutdown_rx: ShutdownRx,
}

impl<S, M> Pipeline<S, M>
where
    S: RecordStore + Clone + Send + Sync + 'static,
    M: FragmentMapper,
{
    pub fn new(config: &PipelineConfig, stages: StageChain, store: S, mapper: M) -> Self {
        // The receiver is kept so that a shutdown requested before `run` is still observed.
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        Self {
            name: config.name.clone(),
            batch_config: config.batch.clone(),
            stages,
            dedup: DeduplicationStage::new(store.clone(), &config.deduplication),
            writer: TransactionalMultiTableWriter::new(store, mapper),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Builds the pipeline with the stages listed in `config`.
    pub fn from_config(config: &PipelineConfig, store: S, mapper: M) -> IngestResult<Self> {
        let stages = build_stage_chain(&config.stages)?;

        Ok(Self::new(config, stages, store, mapper))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Consumes `source` until it ends or shutdown is requested, then flushes the pending batch.
    pub async fn run<St>(&self, source: St) -> PipelineStats
    where
        St: Stream<Item = Record>,
    {
        let span = info_span!("ingest_pipeline", pipeline = %self.name);

        async move {
            info!(
                max_size = self.batch_config.max_size,
                max_fill_ms = self.batch_config.max_fill_ms,
                stages = self.stages.stages().len(),
                "starting pipeline"
            );

            let batches =
                BatchStream::wrap(source, &self.batch_config, self.shutdown_rx.clone());
            pin_mut!(batches);

            let mut stats = PipelineStats::default();
            let mut sequence = 0;
            while let Some(result) = batches.next().await {
                let (batch, shutdown) = match result {
                    ShutdownResult::Ok(batch) => (batch, false),
                    ShutdownResult::Shutdown(batch) => (batch, true),
                };

                if !batch.is_empty() {
                    sequence += 1;
                    let batch_size = batch.len();
                    match self.process_batch(sequence, batch).await {
                        Ok(summary) => stats.record_summary(&summary),
                        Err(err) => {
                            error!(sequence, batch_size, error = %err, "batch failed and was dropped");
                            stats.record_failure(batch_size);
                        }
                    }
                }

                if shutdown {
                    info!("shutdown requested, pending records flushed");
                    break;
                }
            }

            info!(
                batches_committed = stats.batches_committed,
                batches_failed = stats.batches_failed,
                rows_written = stats.rows_written,
                "pipeline completed"
            );

            stats
        }
        .instrument(span)
        .await
    }

    /// Runs one batch through the stages, deduplication and the writer.
    ///
    /// Nothing is persisted unless every step succeeds.
    pub async fn process_batch(
        &self,
        sequence: u64,
        batch: Vec<Record>,
    ) -> IngestResult<BatchSummary> {
        let received = batch.len();
        let span = info_span!("batch", sequence, batch_size = received);

        async move {
            let batch = self.stages.run(batch).await?;

            let transformed = batch.len();
            let batch = self.dedup.apply_batch(batch).await?;
            let duplicates = transformed - batch.len();

            let written = if batch.is_empty() {
                debug!("nothing left to write after deduplication");
                vec![]
            } else {
                self.writer.write(&batch).await?
            };

            let summary = BatchSummary {
                sequence,
                received,
                duplicates,
                written,
            };
            info!(
                received = summary.received,
                duplicates = summary.duplicates,
                rows_written = summary.rows_written(),
                tables = ?summary.written,
                "batch committed"
            );

            Ok(summary)
        }
        .instrument(span)
        .await
    }
}

/// Builds the stages listed in the pipeline configuration, in declaration order.
pub fn build_stage_chain(stages: &[StageConfig]) -> IngestResult<StageChain> {
    let stages = stages
        .iter()
        .map(build_stage)
        .collect::<IngestResult<Vec<_>>>()?;

    Ok(StageChain::new(stages))
}

fn build_stage(config: &StageConfig) -> IngestResult<Stage> {
    match config {
        StageConfig::Builtin {
            stage,
            preserves_input,
        } => Ok(Stage::per_record(stage.as_str(), builtin_transform(*stage))
            .preserving_input(*preserves_input)),
        StageConfig::Parallel {
            name,
            branches,
            preserves_input,
        } => {
            let branches = branches
                .iter()
                .map(|branch| {
                    ParallelBranch::new(branch.stage.as_str(), builtin_transform(branch.stage))
                        .owning(&branch.owned_fields)
                })
                .collect::<IngestResult<Vec<_>>>()?;

            Ok(
                Stage::per_batch(name.clone(), ParallelStageGroup::new(branches)?)
                    .preserving_input(*preserves_input),
            )
        }
    }
}

/// Builds the processor chain run on every record read by the consumer.
pub fn build_processor_chain(
    config: &PipelineConfig,
    registry: ProcessorRegistry,
) -> Arc<PriorityProcessorChain> {
    let layer = ProcessorLayer::from_config(&config.processors);

    Arc::new(PriorityProcessorChain::from_layers(
        config.name.clone(),
        vec![layer],
        registry,
    ))
}

#[cfg(test)]
mod tests {
    use config::shared::{BuiltinStage, ParallelBranchConfig};
    use serde_json::json;

    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::test_utils::mapper::KeyOnlyMapper;
    use crate::test_utils::record::json_row;

    fn config_with_stages(stages: Vec<StageConfig>) -> PipelineConfig {
        PipelineConfig {
            stages,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn builds_stages_in_declaration_order() {
        let chain = build_stage_chain(&[
            StageConfig::Builtin {
                stage: BuiltinStage::StripTitle,
                preserves_input: false,
            },
            StageConfig::Parallel {
                name: "authors".to_string(),
                preserves_input: false,
                branches: vec![ParallelBranchConfig {
                    stage: BuiltinStage::NormalizeAuthor,
                    owned_fields: vec!["author".to_string()],
                }],
            },
        ])
        .unwrap();

        let names: Vec<&str> = chain.stages().iter().map(Stage::name).collect();
        assert_eq!(names, vec!["strip_title", "authors"]);
    }

    #[tokio::test]
    async fn preserving_parallel_group_hands_back_the_original_batch() {
        let chain = build_stage_chain(&[StageConfig::Parallel {
            name: "side".to_string(),
            preserves_input: true,
            branches: vec![ParallelBranchConfig {
                stage: BuiltinStage::StripTitle,
                owned_fields: vec!["title".to_string()],
            }],
        }])
        .unwrap();
        let mut record = Record::new("x1");
        record.data.insert("title".to_string(), json!("  hi  "));

        let batch = chain.run(vec![record]).await.unwrap();

        assert!(chain.stages()[0].preserves_input());
        assert_eq!(batch[0].data_str("title"), Some("  hi  "));
    }

    #[test]
    fn invalid_owned_field_is_rejected() {
        let result = build_stage_chain(&[StageConfig::Parallel {
            name: "broken".to_string(),
            preserves_input: false,
            branches: vec![ParallelBranchConfig {
                stage: BuiltinStage::NormalizeAuthor,
                owned_fields: vec!["uid".to_string()],
            }],
        }]);

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn process_batch_reports_duplicates_and_rows() {
        let store = MemoryStore::new();
        store
            .seed_rows("information_list", vec![json_row(json!({"information_id": "old"}))])
            .await;
        let pipeline = Pipeline::from_config(
            &config_with_stages(vec![]),
            store.clone(),
            KeyOnlyMapper::default(),
        )
        .unwrap();

        let summary = pipeline
            .process_batch(1, vec![Record::new("old"), Record::new("new")])
            .await
            .unwrap();

        assert_eq!(summary.received, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.rows_written(), 1);
        assert_eq!(store.rows("information_list").await.len(), 2);
    }

    #[tokio::test]
    async fn fully_duplicated_batch_writes_nothing() {
        let store = MemoryStore::new();
        store
            .seed_rows("information_list", vec![json_row(json!({"information_id": "a"}))])
            .await;
        let pipeline = Pipeline::from_config(
            &config_with_stages(vec![]),
            store.clone(),
            KeyOnlyMapper::default(),
        )
        .unwrap();

        let summary = pipeline
            .process_batch(1, vec![Record::new("a")])
            .await
            .unwrap();

        assert!(summary.written.is_empty());
        assert_eq!(store.rows("information_list").await.len(), 1);
    }
}
