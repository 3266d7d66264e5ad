use config::shared::{IntoConnectOptions, PgConnectionConfig, TlsConfig};
use secrecy::SecretString;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

/// A throwaway database on the local test server.
pub struct PgDatabase {
    pub config: PgConnectionConfig,
    pub pool: PgPool,
}

impl PgDatabase {
    /// Creates a database with a random name on the server described by the `TESTS_DATABASE_*`
    /// environment variables.
    ///
    /// # Panics
    /// Panics if a required variable is missing or the database cannot be created.
    pub async fn spawn() -> Self {
        let config = local_pg_connection_config();
        let pool = create_pg_database(&config).await;

        Self { config, pool }
    }

    /// Closes the pool and drops the database.
    pub async fn cleanup(self) {
        self.pool.close().await;
        drop_pg_database(&self.config).await;
    }
}

/// Connection settings for an isolated test database.
///
/// Reads `TESTS_DATABASE_HOST`, `TESTS_DATABASE_PORT`, `TESTS_DATABASE_USERNAME` and the
/// optional `TESTS_DATABASE_PASSWORD`.
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(SecretString::new),
        tls: TlsConfig::default(),
    }
}

/// Creates the database named in `config` and returns a pool connected to it.
///
/// # Panics
/// Panics if connection or database creation fails.
pub async fn create_pg_database(config: &PgConnectionConfig) -> PgPool {
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"create database "{}";"#, config.name))
        .await
        .expect("Failed to create database");

    PgPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to Postgres")
}

/// Drops the database named in `config`, terminating its remaining connections first.
///
/// Failures are printed and ignored so cleanup never fails a test.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let mut connection = match PgConnection::connect_with(&config.without_db()).await {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("warning: failed to connect to Postgres for cleanup: {e}");
            return;
        }
    };

    let terminate = format!(
        r#"
        select pg_terminate_backend(pid)
        from pg_stat_activity
        where datname = '{}' and pid <> pg_backend_pid();"#,
        config.name
    );
    if let Err(e) = connection.execute(&*terminate).await {
        eprintln!("warning: failed to terminate connections to {}: {e}", config.name);
    }

    if let Err(e) = connection
        .execute(&*format!(r#"drop database if exists "{}";"#, config.name))
        .await
    {
        eprintln!("warning: failed to drop database {}: {e}", config.name);
    }
}
