use serde::Deserialize;

use crate::shared::{PgConnectionConfig, ValidationError};

/// Backing store for deduplication lookups and batch writes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StoreConfig {
    /// Keeps all rows in process memory. Nothing survives a restart.
    Memory,
    /// Persists rows in Postgres.
    Postgres {
        /// Connection settings for the database.
        connection: PgConnectionConfig,
        /// Maximum number of pooled connections.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Whether the bootstrap migrations are applied on startup.
        #[serde(default)]
        apply_migrations: bool,
    },
}

impl StoreConfig {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::Postgres {
                connection,
                max_connections,
                ..
            } => {
                connection.tls.validate()?;

                if *max_connections == 0 {
                    return Err(ValidationError::InvalidFieldValue {
                        field: "store.max_connections".to_string(),
                        constraint: "must be greater than 0".to_string(),
                    });
                }

                Ok(())
            }
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

fn default_max_connections() -> u32 {
    StoreConfig::DEFAULT_MAX_CONNECTIONS
}
