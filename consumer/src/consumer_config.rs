use config::load_config;
use config::shared::ConsumerConfig;

use crate::error::{ConsumerError, ConsumerResult};

/// Loads and validates the consumer configuration.
pub fn load_consumer_config() -> ConsumerResult<ConsumerConfig> {
    let config = load_config::<ConsumerConfig>().map_err(ConsumerError::config)?;
    config.validate().map_err(ConsumerError::config)?;

    Ok(config)
}
