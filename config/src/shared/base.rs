use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// A parallel stage was configured without branches.
    #[error("Parallel stage `{0}` must declare at least one branch")]
    EmptyParallelStage(String),
    /// A field path does not address a record field.
    #[error("Invalid field path `{path}` in stage `{stage}`")]
    InvalidFieldPath { stage: String, path: String },
}
