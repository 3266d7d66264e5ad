//! Ingest consumer binary.
//!
//! Reads newline-delimited JSON records from stdin or a file and runs them through the
//! configured ingest pipeline until the input ends or the process is asked to stop.

use config::shared::ConsumerConfig;
use telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::consumer_config::load_consumer_config;
use crate::core::start_consumer_with_config;
use crate::error::{ConsumerError, ConsumerResult};

mod consumer_config;
mod core;
mod error;

fn main() {
    if let Err(err) = run() {
        eprint!("{}", err.render_report());
        std::process::exit(1);
    }
}

/// Loads configuration, initializes tracing and runs the consumer on a multi-threaded runtime.
fn run() -> ConsumerResult<()> {
    let consumer_config = load_consumer_config()?;

    let _log_flusher =
        init_tracing(env!("CARGO_BIN_NAME"), &consumer_config.log).map_err(ConsumerError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(consumer_config))
}

async fn async_main(consumer_config: ConsumerConfig) -> ConsumerResult<()> {
    match start_consumer_with_config(consumer_config).await {
        Ok(stats) => {
            info!(
                batches_committed = stats.batches_committed,
                batches_failed = stats.batches_failed,
                records_received = stats.records_received,
                rows_written = stats.rows_written,
                "consumer completed"
            );

            Ok(())
        }
        Err(err) => {
            error!("{err:#}");

            Err(ConsumerError::Run(err))
        }
    }
}
