//! Cache manager that dispatches to the configured provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use legisync_core::config::CacheConfig;
use legisync_core::error::AppError;
use legisync_core::result::AppResult;
use legisync_core::traits::CacheProvider;

use crate::layered::{CacheStats, MultiLevelCache};

/// Cache manager that wraps the configured cache provider.
///
/// The provider is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// The inner cache provider.
    inner: Arc<dyn CacheProvider>,
    /// Set when the provider is layered, for sweeping and stats.
    layered: Option<Arc<MultiLevelCache>>,
}

impl CacheManager {
    /// Create a new cache manager from configuration.
    ///
    /// For the layered provider the L1 sweeper is started and stops when
    /// `shutdown` is cancelled.
    pub async fn new(config: &CacheConfig, shutdown: CancellationToken) -> AppResult<Self> {
        match config.provider.as_str() {
            "layered" => {
                info!(l2 = %config.l2_backend, max_items = config.l1.max_items, "Initializing layered cache provider");
                let l2 = Self::backend(config, &config.l2_backend).await?;
                let cache = Arc::new(MultiLevelCache::new(
                    l2,
                    &config.l1,
                    config.default_ttl_seconds,
                ));
                cache.spawn_sweeper(shutdown);
                Ok(Self {
                    inner: cache.clone(),
                    layered: Some(cache),
                })
            }
            other => Ok(Self {
                inner: Self::backend(config, other).await?,
                layered: None,
            }),
        }
    }

    async fn backend(config: &CacheConfig, name: &str) -> AppResult<Arc<dyn CacheProvider>> {
        match name {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis cache provider");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                let provider =
                    crate::redis::RedisCacheProvider::new(client, config.default_ttl_seconds);
                Ok(Arc::new(provider))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory cache provider");
                let provider = crate::memory::MemoryCacheProvider::new(
                    &config.memory,
                    config.default_ttl_seconds,
                );
                Ok(Arc::new(provider))
            }
            other => Err(AppError::configuration(format!(
                "Unknown cache provider: '{other}'. Supported: memory, redis, layered"
            ))),
        }
    }

    /// Create a cache manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn CacheProvider>) -> Self {
        Self {
            inner: provider,
            layered: None,
        }
    }

    /// Get a reference to the inner provider.
    pub fn provider(&self) -> &dyn CacheProvider {
        self.inner.as_ref()
    }

    /// Tier statistics, when the provider is layered.
    pub fn stats(&self) -> Option<CacheStats> {
        self.layered.as_ref().map(|cache| cache.stats())
    }
}

#[async_trait]
impl CacheProvider for CacheManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn set_default(&self, key: &str, value: &str) -> AppResult<()> {
        self.inner.set_default(key, value).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        self.inner.delete_pattern(pattern).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }

    async fn flush_all(&self) -> AppResult<()> {
        self.inner.flush_all().await
    }
}
