use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Stages shipped with the ingest crate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStage {
    /// Trims surrounding whitespace from `data.title`.
    StripTitle,
    /// Title-cases `data.author`.
    NormalizeAuthor,
    /// Replaces a negative `data.viewCount` with zero.
    ClampViewCount,
    /// Truncates `data.info_date` to `YYYY-MM`.
    NormalizeDate,
}

impl BuiltinStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinStage::StripTitle => "strip_title",
            BuiltinStage::NormalizeAuthor => "normalize_author",
            BuiltinStage::ClampViewCount => "clamp_view_count",
            BuiltinStage::NormalizeDate => "normalize_date",
        }
    }
}

impl fmt::Display for BuiltinStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One branch of a parallel stage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ParallelBranchConfig {
    pub stage: BuiltinStage,
    /// Field paths copied back from this branch. An empty list copies the whole record.
    #[serde(default)]
    pub owned_fields: Vec<String>,
}

/// A transform stage in declaration order.
///
/// Deduplication and the write stage always run after the configured stages.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StageConfig {
    Builtin {
        stage: BuiltinStage,
        /// Runs the stage on a copy and continues with the unmodified batch.
        #[serde(default)]
        preserves_input: bool,
    },
    Parallel {
        name: String,
        branches: Vec<ParallelBranchConfig>,
        /// Runs the group on a copy and continues with the unmodified batch.
        #[serde(default)]
        preserves_input: bool,
    },
}

impl StageConfig {
    pub fn name(&self) -> &str {
        match self {
            StageConfig::Builtin { stage, .. } => stage.as_str(),
            StageConfig::Parallel { name, .. } => name,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let StageConfig::Parallel { name, branches, .. } = self else {
            return Ok(());
        };

        if branches.is_empty() {
            return Err(ValidationError::EmptyParallelStage(name.clone()));
        }

        for branch in branches {
            for path in &branch.owned_fields {
                if !is_valid_field_path(path) {
                    return Err(ValidationError::InvalidFieldPath {
                        stage: name.clone(),
                        path: path.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Field paths are a bare name or `segment.name`, with no empty segments.
fn is_valid_field_path(path: &str) -> bool {
    !path.is_empty() && path.split('.').count() <= 2 && path.split('.').all(|s| !s.is_empty())
}
