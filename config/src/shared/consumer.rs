use std::path::PathBuf;

use serde::Deserialize;

use crate::Config;
use crate::shared::{LogConfig, PipelineConfig, StoreConfig, ValidationError};

/// Where the consumer reads newline-delimited JSON records from.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SourceConfig {
    #[default]
    Stdin,
    File { path: PathBuf },
}

/// Top-level configuration of the consumer binary.
///
/// Does not implement `Serialize` since the store section may hold a password.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConsumerConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pipeline.validate()?;
        self.store.validate()?;

        Ok(())
    }
}

impl Config for ConsumerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
