use std::time::Duration;

use config::shared::{IntoConnectOptions, PgConnectionConfig};
use sqlx::{PgPool, postgres::PgPoolOptions};

/// Idle connections are closed after this long.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates the pool backing the record store.
///
/// The pool connects lazily, so a misconfigured database surfaces on the first query.
pub fn create_store_pool(config: &PgConnectionConfig, max_connections: u32) -> PgPool {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(0)
        .idle_timeout(Some(IDLE_TIMEOUT))
        .connect_lazy_with(config.with_db())
}
