use serde::{Deserialize, Serialize};

use crate::shared::{
    BatchConfig, DeduplicationConfig, ProcessorConfig, StageConfig, ValidationError,
};

/// Target tables written by the information mapping.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TableNamesConfig {
    #[serde(default = "default_list_table")]
    pub list: String,
    #[serde(default = "default_tagging_table")]
    pub tagging: String,
    #[serde(default = "default_attachment_table")]
    pub attachment: String,
    #[serde(default = "default_section_table")]
    pub section: String,
    /// Table resolving a source domain into a `source_id`.
    #[serde(default = "default_source_table")]
    pub source: String,
}

impl Default for TableNamesConfig {
    fn default() -> Self {
        Self {
            list: default_list_table(),
            tagging: default_tagging_table(),
            attachment: default_attachment_table(),
            section: default_section_table(),
            source: default_source_table(),
        }
    }
}

fn default_list_table() -> String {
    "information_list".to_string()
}

fn default_tagging_table() -> String {
    "information_tagging_relationships".to_string()
}

fn default_attachment_table() -> String {
    "information_attachment".to_string()
}

fn default_section_table() -> String {
    "information_section".to_string()
}

fn default_source_table() -> String {
    "information_source".to_string()
}

/// Configuration for an ingest pipeline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Name attached to the pipeline span.
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Transform stages in the order they run.
    #[serde(default)]
    pub stages: Vec<StageConfig>,
    /// Processors run on every record before it enters the pipeline.
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
    #[serde(default)]
    pub deduplication: DeduplicationConfig,
    #[serde(default)]
    pub tables: TableNamesConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.batch.validate()?;
        self.deduplication.validate()?;

        for stage in &self.stages {
            stage.validate()?;
        }

        for processor in &self.processors {
            processor.validate()?;
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            batch: BatchConfig::default(),
            stages: vec![],
            processors: vec![],
            deduplication: DeduplicationConfig::default(),
            tables: TableNamesConfig::default(),
        }
    }
}

fn default_pipeline_name() -> String {
    "information".to_string()
}
