use anyhow::Context;
use config::shared::{
    BatchConfig, ConsumerConfig, PgConnectionConfig, PipelineConfig, SourceConfig, StoreConfig,
};
use futures::Stream;
use ingest::mapping::InformationMapper;
use ingest::migrations::apply_migrations;
use ingest::pipeline::{Pipeline, PipelineStats, build_processor_chain};
use ingest::processor::ProcessorRegistry;
use ingest::source::{ndjson_records, open_reader};
use ingest::stages::writer::FragmentMapper;
use ingest::store::RecordStore;
use ingest::store::memory::MemoryStore;
use ingest::store::postgres::PostgresStore;
use ingest::types::Record;
use tracing::{debug, info, warn};

/// Starts the consumer with the provided configuration.
///
/// Builds the processor chain and the record source, then the store selected by the
/// configuration, and runs the pipeline until the source ends or a shutdown signal arrives.
pub async fn start_consumer_with_config(
    consumer_config: ConsumerConfig,
) -> anyhow::Result<PipelineStats> {
    info!("starting consumer");

    log_config(&consumer_config);

    let processors =
        build_processor_chain(&consumer_config.pipeline, ProcessorRegistry::with_builtins());
    processors
        .ensure_resolved()
        .context("invalid processor configuration")?;

    let reader = open_reader(&consumer_config.source)
        .await
        .context("failed to open the record source")?;
    let records = ndjson_records(reader, processors);

    let mapper = InformationMapper::new(consumer_config.pipeline.tables.clone());

    // Each store gets its own pipeline type, so dispatch happens here once.
    match &consumer_config.store {
        StoreConfig::Memory => {
            let store = MemoryStore::new();
            start_pipeline(&consumer_config.pipeline, store, mapper, records).await
        }
        StoreConfig::Postgres {
            connection,
            max_connections,
            apply_migrations: run_migrations,
        } => {
            if *run_migrations {
                apply_migrations(connection)
                    .await
                    .context("failed to apply migrations")?;
            }

            let store = PostgresStore::new(connection, *max_connections);
            start_pipeline(&consumer_config.pipeline, store, mapper, records).await
        }
    }
}

/// Runs the pipeline and requests a shutdown on SIGINT or SIGTERM.
///
/// On shutdown the pending records are flushed as a final batch before returning.
#[tracing::instrument(skip_all)]
async fn start_pipeline<S, M, St>(
    config: &PipelineConfig,
    store: S,
    mapper: M,
    records: St,
) -> anyhow::Result<PipelineStats>
where
    S: RecordStore + Clone + Send + Sync + 'static,
    M: FragmentMapper,
    St: Stream<Item = Record>,
{
    let pipeline =
        Pipeline::from_config(config, store, mapper).context("invalid stage configuration")?;

    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        wait_for_signal().await;

        if let Err(e) = shutdown_tx.shutdown() {
            warn!(error = ?e, "failed to send shutdown signal");
            return;
        }

        info!("shutdown signal sent to the pipeline");
    });

    let stats = pipeline.run(records).await;

    // The pipeline may have finished because the source ended, in which case the signal task is
    // still waiting.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    Ok(stats)
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!(error = %err, "failed to register sigterm handler, listening for ctrl+c only");
            let _ = tokio::signal::ctrl_c().await;
            info!("sigint (ctrl+c) received, shutting down pipeline");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("sigint (ctrl+c) received, shutting down pipeline");
        }
        _ = sigterm.recv() => {
            info!("sigterm received, shutting down pipeline");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("ctrl+c received, shutting down pipeline");
}

fn log_config(config: &ConsumerConfig) {
    log_pipeline_config(&config.pipeline);
    log_store_config(&config.store);
    log_source_config(&config.source);
}

fn log_pipeline_config(config: &PipelineConfig) {
    debug!(
        name = config.name,
        stages = config.stages.len(),
        processors = config.processors.len(),
        dedup_table = config.deduplication.table,
        dedup_column = config.deduplication.column,
        "pipeline config"
    );
    log_batch_config(&config.batch);
}

fn log_batch_config(config: &BatchConfig) {
    debug!(
        max_size = config.max_size,
        max_fill_ms = config.max_fill_ms,
        "batch config"
    );
}

fn log_store_config(config: &StoreConfig) {
    match config {
        StoreConfig::Memory => {
            debug!("using memory store");
        }
        StoreConfig::Postgres {
            connection,
            max_connections,
            apply_migrations,
        } => {
            debug!(max_connections, apply_migrations, "using postgres store");
            log_pg_connection_config(connection);
        }
    }
}

fn log_pg_connection_config(config: &PgConnectionConfig) {
    debug!(
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "store postgres connection config",
    );
}

fn log_source_config(config: &SourceConfig) {
    match config {
        SourceConfig::Stdin => debug!("reading records from stdin"),
        SourceConfig::File { path } => debug!(path = %path.display(), "reading records from file"),
    }
}
