//! Configuration types shared by the ingest crates.

mod base;
mod batch;
mod connection;
mod consumer;
mod dedup;
mod log;
mod pipeline;
mod processor;
mod stage;
mod store;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use connection::{DefaultPgConnectionOptions, IntoConnectOptions, PgConnectionConfig, TlsConfig};
pub use consumer::{ConsumerConfig, SourceConfig};
pub use dedup::DeduplicationConfig;
pub use log::{LogConfig, LogLevel};
pub use pipeline::{PipelineConfig, TableNamesConfig};
pub use processor::ProcessorConfig;
pub use stage::{BuiltinStage, ParallelBranchConfig, StageConfig};
pub use store::StoreConfig;
