use std::sync::Once;

use config::shared::{LogConfig, LogLevel};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable enabling log output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to create the log file appender: {0}")]
    FileAppender(#[from] InitError),

    #[error("failed to bridge `log` records into tracing: {0}")]
    LogTracer(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Keeps the background file writer alive. Buffered lines are flushed when it is dropped, so
/// hold it until the process exits.
#[must_use]
pub struct LogFlusher {
    _guard: Option<WorkerGuard>,
}

/// Installs the global subscriber for `app_name`.
///
/// Logs go to stdout and, when [`LogConfig::directory`] is set, to a daily rolling file named
/// `{app_name}.YYYY-MM-DD.log` in that directory. `RUST_LOG` overrides the configured level.
/// Records emitted through the `log` facade by dependencies are forwarded as tracing events.
pub fn init_tracing(app_name: &str, log_config: &LogConfig) -> Result<LogFlusher, TracingError> {
    LogTracer::init()?;

    let filter = env_filter(log_config.level);
    let stdout_layer = fmt::layer().with_target(false);

    let (file_layer, guard) = match &log_config.directory {
        Some(directory) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(app_name)
                .filename_suffix("log")
                .build(directory)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(LogFlusher { _guard: guard })
}

/// Installs a test subscriber writing through the test harness capture.
///
/// Does nothing unless `ENABLE_TRACING` is set. Safe to call from every test.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TRACING_ENV_NAME).is_err() {
            return;
        }

        let _ = fmt()
            .with_env_filter(env_filter(LogLevel::Debug))
            .with_test_writer()
            .try_init();
    });
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}
