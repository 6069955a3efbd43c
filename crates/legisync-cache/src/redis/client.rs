//! Shared Redis connection for the L2 tier.

use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use legisync_core::config::cache::RedisCacheConfig;
use legisync_core::config::database::mask_credentials;
use legisync_core::error::{AppError, ErrorKind};
use legisync_core::result::AppResult;

/// A reconnecting multiplexed connection plus the namespace every key
/// is written under (`legisync:` by default), so several deployments can
/// share one Redis.
#[derive(Debug, Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisClient {
    /// Connect and confirm the server answers `PING`, so a bad url fails
    /// at startup instead of on the first cache miss.
    pub async fn connect(config: &RedisCacheConfig) -> AppResult<Self> {
        let masked = mask_credentials(&config.url);
        info!(url = %masked, prefix = %config.key_prefix, "Connecting to Redis");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, format!("Invalid Redis url {masked}"), e)
        })?;
        let mut conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::with_source(ErrorKind::Cache, format!("Failed to connect to {masked}"), e)
        })?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Cache, "Redis did not answer PING", e))?;

        info!("Connected to Redis");
        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// A handle on the shared connection.
    pub fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// `key` inside this deployment's namespace.
    pub fn prefixed_key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }
}
