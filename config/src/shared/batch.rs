use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Batch window configuration for a pipeline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Maximum number of records in a batch.
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
    /// Maximum time, in milliseconds, measured from the first pending record, to wait for a
    /// batch to fill before it is emitted.
    #[serde(default = "default_batch_max_fill_ms")]
    pub max_fill_ms: u64,
}

impl BatchConfig {
    /// Default maximum batch size.
    pub const DEFAULT_MAX_SIZE: usize = 10;

    /// Default maximum fill time in milliseconds.
    pub const DEFAULT_MAX_FILL_MS: u64 = 5000;

    /// Validates batch configuration settings.
    ///
    /// Ensures max_size is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.max_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
            max_fill_ms: default_batch_max_fill_ms(),
        }
    }
}

fn default_batch_max_size() -> usize {
    BatchConfig::DEFAULT_MAX_SIZE
}

fn default_batch_max_fill_ms() -> u64 {
    BatchConfig::DEFAULT_MAX_FILL_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_max_size_is_rejected() {
        let config = BatchConfig {
            max_size: 0,
            max_fill_ms: 0,
        };

        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: BatchConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, BatchConfig::default());
        assert_eq!(config.max_size, 10);
        assert_eq!(config.max_fill_ms, 5000);
    }
}
