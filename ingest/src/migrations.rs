use config::shared::{IntoConnectOptions, PgConnectionConfig};
use sqlx::{Executor, postgres::PgPoolOptions};
use tracing::info;

use crate::error::IngestResult;

const CREATE_MIGRATIONS_SCHEMA: &str = "create schema if not exists ingest;";

const SET_MIGRATIONS_SEARCH_PATH: &str = "set search_path = 'ingest';";

/// Creates the information tables and the source lookup table when they are missing.
///
/// Tables are created in `public`. The `_sqlx_migrations` bookkeeping table lives in the
/// `ingest` schema so it does not show up next to the data.
pub async fn apply_migrations(connection_config: &PgConnectionConfig) -> IngestResult<()> {
    let options = connection_config.with_db();

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute(CREATE_MIGRATIONS_SCHEMA).await?;
                conn.execute(SET_MIGRATIONS_SEARCH_PATH).await?;

                Ok(())
            })
        })
        .connect_with(options)
        .await?;

    info!("applying ingest migrations");

    let migrator = sqlx::migrate!("./migrations");
    migrator.run(&pool).await?;
    pool.close().await;

    info!("ingest migrations applied");

    Ok(())
}
