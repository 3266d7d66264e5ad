use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// A processor run on every record at construction time.
///
/// `name` is resolved against the processor registry the first time a record is built, so an
/// unknown name surfaces as a construction error rather than a load error.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProcessorConfig {
    pub name: String,
    /// Lower priorities run first. Equal priorities keep declaration order.
    #[serde(default)]
    pub priority: i32,
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "pipeline.processors.name".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
