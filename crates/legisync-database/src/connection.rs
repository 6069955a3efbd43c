//! PostgreSQL pool setup.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use legisync_core::config::DatabaseConfig;
use legisync_core::error::{AppError, ErrorKind};

/// Name reported in `pg_stat_activity`, so advisory-lock holders can be
/// traced back to a LegiSync process.
const APPLICATION_NAME: &str = "legisync";

/// Shared handle to the sqlx pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open the pool described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let masked = config.masked_url();
        info!(
            url = %masked,
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let options = config
            .url
            .parse::<PgConnectOptions>()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Invalid database url {masked}"),
                    e,
                )
            })?
            .application_name(APPLICATION_NAME);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to connect to {masked}: {e}"),
                    e,
                )
            })?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// The underlying sqlx pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wait for checked-out connections and close the pool. Advisory locks
    /// still parked on a connection are released by the server when it
    /// closes.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
