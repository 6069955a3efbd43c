//! In-memory cache implementation using the moka crate.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use legisync_core::config::cache::MemoryCacheConfig;
use legisync_core::result::AppResult;
use legisync_core::traits::CacheProvider;

use crate::keys::matches_pattern;

/// A cached value with the TTL it was written with.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires each entry after its own TTL; an overwrite restarts the clock.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-memory cache provider using moka.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    /// The underlying moka cache.
    cache: Cache<String, Entry>,
    /// Default TTL for entries.
    default_ttl: Duration,
}

impl MemoryCacheProvider {
    /// Create a new in-memory cache from configuration.
    ///
    /// `time_to_live_seconds` caps every entry regardless of its own TTL.
    pub fn new(config: &MemoryCacheConfig, default_ttl_seconds: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.time_to_live_seconds))
            .expire_after(PerEntryTtl)
            .build();

        Self {
            cache,
            default_ttl: Duration::from_secs(default_ttl_seconds),
        }
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.cache
            .insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn set_default(&self, key: &str, value: &str) -> AppResult<()> {
        self.set(key, value, self.default_ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.remove(key).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.cache.contains_key(key))
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        // Moka has no key scan, so iterate and collect first.
        let keys_to_remove: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| matches_pattern(pattern, key))
            .map(|(key, _)| key.to_string())
            .collect();

        let mut count = 0u64;
        for key in keys_to_remove {
            if self.cache.remove(&key).await.is_some() {
                count += 1;
            }
        }

        debug!(pattern, count, "Deleted keys matching pattern");
        Ok(count)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn flush_all(&self) -> AppResult<()> {
        self.cache.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legisync_core::traits::CacheJson;

    fn make_provider() -> MemoryCacheProvider {
        let config = MemoryCacheConfig {
            max_capacity: 1000,
            time_to_live_seconds: 60,
        };
        MemoryCacheProvider::new(&config, 60)
    }

    #[tokio::test]
    async fn test_set_get() {
        let provider = make_provider();
        provider
            .set("legislators:roster", "[]", Duration::from_secs(60))
            .await
            .unwrap();
        let val = provider.get("legislators:roster").await.unwrap();
        assert_eq!(val, Some("[]".to_string()));
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let provider = make_provider();
        for year in [2022, 2023] {
            provider
                .set(&format!("bills:year:{year}"), "[]", Duration::from_secs(60))
                .await
                .unwrap();
        }
        provider.set_default("votes:day:2023-01-02", "[]").await.unwrap();

        let removed = provider.delete_pattern("bills:*").await.unwrap();
        assert_eq!(removed, 2);
        assert!(provider.get("bills:year:2022").await.unwrap().is_none());
        assert!(provider.get("votes:day:2023-01-02").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_json_roundtrip() {
        let provider = make_provider();
        let data = serde_json::json!({"year": 2023, "count": 42});
        provider
            .set_json("bills:year:2023", &data, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        let result: Option<serde_json::Value> = provider.get_json("bills:year:2023").await.unwrap();
        assert_eq!(result, Some(data));
    }
}
