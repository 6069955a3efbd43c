//! Cache port shared by the sync services and the job handlers.
//!
//! Values are JSON strings. Keys are namespaced by record family
//! (`legislators:`, `bills:`, `votes:`, `analytics:`); providers add their
//! own prefix on top.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::result::AppResult;

/// A cache backend: Redis, moka, or the two-tier layered cache.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Value under `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Store `value` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Store `value` for the provider's configured default TTL.
    async fn set_default(&self, key: &str, value: &str) -> AppResult<()>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Delete every key matching a glob such as `"bills:year:*"`. Returns
    /// the number of keys removed.
    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64>;

    /// Whether the backend answers.
    async fn health_check(&self) -> AppResult<bool>;

    /// Drop everything this provider owns.
    async fn flush_all(&self) -> AppResult<()>;
}

/// Typed JSON access on top of any [`CacheProvider`], trait objects included.
#[async_trait]
pub trait CacheJson: CacheProvider {
    /// Decode the value under `key`.
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> AppResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and store `value`; `None` uses the provider's default TTL.
    async fn set_json<T: Serialize + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> AppResult<()> {
        let raw = serde_json::to_string(value)?;
        match ttl {
            Some(ttl) => self.set(key, &raw, ttl).await,
            None => self.set_default(key, &raw).await,
        }
    }
}

impl<C: CacheProvider + ?Sized> CacheJson for C {}
