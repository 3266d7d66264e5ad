use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Where the deduplication stage looks up already persisted keys.
///
/// The key of a record is its `uid`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DeduplicationConfig {
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_column")]
    pub column: String,
}

impl DeduplicationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("pipeline.deduplication.table", &self.table),
            ("pipeline.deduplication.column", &self.column),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidFieldValue {
                    field: field.to_string(),
                    constraint: "must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            column: default_column(),
        }
    }
}

fn default_table() -> String {
    "information_list".to_string()
}

fn default_column() -> String {
    "information_id".to_string()
}
