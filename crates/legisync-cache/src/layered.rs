//! Two-tier cache: a bounded in-process L1 in front of a shared L2.
//!
//! Reads check L1, then L2, promoting L2 hits into L1. Writes go to both
//! tiers. L1 never holds more than `max_items` entries: an insert that would
//! overflow it first drops expired entries, then the fraction of entries
//! closest to expiry. A background sweep removes expired entries between
//! inserts. L2 expires entries on its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use legisync_core::config::cache::L1CacheConfig;
use legisync_core::result::AppResult;
use legisync_core::traits::CacheProvider;

use crate::keys::matches_pattern;

/// An L1 entry.
#[derive(Debug, Clone)]
struct CacheItem {
    value: String,
    expires_at: Instant,
}

impl CacheItem {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Hit/miss counters.
#[derive(Debug, Default)]
struct Counters {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads served by L1.
    pub l1_hits: u64,
    /// Reads served by L2 (and promoted).
    pub l2_hits: u64,
    /// Reads that missed both tiers.
    pub misses: u64,
    /// Entries dropped from L1 to make room.
    pub evictions: u64,
    /// Current number of L1 entries.
    pub l1_size: usize,
}

/// Read-through L1/L2 cache.
#[derive(Debug)]
pub struct MultiLevelCache {
    l1: Mutex<HashMap<String, CacheItem>>,
    l2: Arc<dyn CacheProvider>,
    max_items: usize,
    evict_count: usize,
    promote_ttl: Duration,
    default_ttl: Duration,
    sweep_interval: Duration,
    counters: Counters,
}

impl MultiLevelCache {
    /// Build a layered cache over an L2 provider.
    pub fn new(l2: Arc<dyn CacheProvider>, config: &L1CacheConfig, default_ttl_seconds: u64) -> Self {
        let max_items = config.max_items.max(1);
        let evict_count = ((max_items as f64) * config.eviction_fraction).ceil() as usize;
        Self {
            l1: Mutex::new(HashMap::with_capacity(max_items.min(4096))),
            l2,
            max_items,
            evict_count: evict_count.clamp(1, max_items),
            promote_ttl: Duration::from_secs(config.default_ttl_seconds),
            default_ttl: Duration::from_secs(default_ttl_seconds),
            sweep_interval: Duration::from_secs(config.sweep_interval_seconds.max(1)),
            counters: Counters::default(),
        }
    }

    /// Start the periodic expired-entry sweep. Stops when `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.sweep_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("L1 sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = cache.sweep_expired();
                        if removed > 0 {
                            debug!(removed, "Swept expired L1 entries");
                        }
                    }
                }
            }
        })
    }

    /// Remove every expired L1 entry. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut l1 = self.lock_l1();
        let before = l1.len();
        l1.retain(|_, item| !item.is_expired(now));
        before - l1.len()
    }

    /// Drop a key from L1 only. L2 keeps it, so the next read promotes it.
    pub fn invalidate_local(&self, key: &str) {
        self.lock_l1().remove(key);
    }

    /// Number of entries currently in L1, expired or not.
    pub fn l1_len(&self) -> usize {
        self.lock_l1().len()
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_hits: self.counters.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.counters.l2_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            l1_size: self.l1_len(),
        }
    }

    fn lock_l1(&self) -> MutexGuard<'_, HashMap<String, CacheItem>> {
        // Every critical section leaves the map consistent, so a poisoned
        // lock is still safe to use.
        self.l1.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn l1_get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut l1 = self.lock_l1();
        match l1.get(key) {
            Some(item) if !item.is_expired(now) => Some(item.value.clone()),
            Some(_) => {
                l1.remove(key);
                None
            }
            None => None,
        }
    }

    fn l1_insert(&self, key: &str, value: &str, ttl: Duration) {
        let now = Instant::now();
        let mut l1 = self.lock_l1();
        if !l1.contains_key(key) && l1.len() >= self.max_items {
            let evicted = self.make_room(&mut l1, now);
            self.counters.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        l1.insert(
            key.to_string(),
            CacheItem {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
    }

    /// Free at least one slot: drop expired entries, then if still full the
    /// `evict_count` entries nearest to expiry.
    fn make_room(&self, l1: &mut HashMap<String, CacheItem>, now: Instant) -> usize {
        let before = l1.len();
        l1.retain(|_, item| !item.is_expired(now));
        if l1.len() < self.max_items {
            return before - l1.len();
        }

        let mut by_expiry: Vec<(Instant, String)> = l1
            .iter()
            .map(|(key, item)| (item.expires_at, key.clone()))
            .collect();
        let n = self.evict_count.min(by_expiry.len());
        by_expiry.select_nth_unstable_by(n - 1, |a, b| a.0.cmp(&b.0));
        for (_, key) in by_expiry.into_iter().take(n) {
            l1.remove(&key);
        }
        debug!(evicted = before - l1.len(), "L1 full; evicted nearest-expiry entries");
        before - l1.len()
    }
}

#[async_trait]
impl CacheProvider for MultiLevelCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        if let Some(value) = self.l1_get(key) {
            self.counters.l1_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(value));
        }

        match self.l2.get(key).await {
            Ok(Some(value)) => {
                self.counters.l2_hits.fetch_add(1, Ordering::Relaxed);
                self.l1_insert(key, &value, self.promote_ttl);
                Ok(Some(value))
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                // An unreachable L2 degrades to a miss.
                warn!(key, error = %e, "L2 read failed; treating as miss");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.l1_insert(key, value, ttl);
        self.l2.set(key, value, ttl).await
    }

    async fn set_default(&self, key: &str, value: &str) -> AppResult<()> {
        self.set(key, value, self.default_ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.lock_l1().remove(key);
        self.l2.delete(key).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        if self.l1_get(key).is_some() {
            return Ok(true);
        }
        self.l2.exists(key).await
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        let local = {
            let mut l1 = self.lock_l1();
            let before = l1.len();
            l1.retain(|key, _| !matches_pattern(pattern, key));
            (before - l1.len()) as u64
        };
        let remote = self.l2.delete_pattern(pattern).await?;
        Ok(local.max(remote))
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.l2.health_check().await
    }

    async fn flush_all(&self) -> AppResult<()> {
        let cleared = {
            let mut l1 = self.lock_l1();
            let n = l1.len();
            l1.clear();
            n
        };
        info!(cleared, "Flushed L1");
        self.l2.flush_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// L2 double that counts reads.
    #[derive(Debug, Default)]
    struct CountingStore {
        values: Mutex<HashMap<String, String>>,
        reads: AtomicU64,
    }

    impl CountingStore {
        fn reads(&self) -> u64 {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CacheProvider for CountingStore {
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str, _ttl: Duration) -> AppResult<()> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn set_default(&self, key: &str, value: &str) -> AppResult<()> {
            self.set(key, value, Duration::ZERO).await
        }

        async fn delete(&self, key: &str) -> AppResult<()> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> AppResult<bool> {
            Ok(self.values.lock().unwrap().contains_key(key))
        }

        async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
            let mut values = self.values.lock().unwrap();
            let before = values.len();
            values.retain(|key, _| !matches_pattern(pattern, key));
            Ok((before - values.len()) as u64)
        }

        async fn health_check(&self) -> AppResult<bool> {
            Ok(true)
        }

        async fn flush_all(&self) -> AppResult<()> {
            self.values.lock().unwrap().clear();
            Ok(())
        }
    }

    fn layered(max_items: usize) -> (Arc<CountingStore>, MultiLevelCache) {
        let l2 = Arc::new(CountingStore::default());
        let config = L1CacheConfig {
            max_items,
            default_ttl_seconds: 60,
            sweep_interval_seconds: 1,
            eviction_fraction: 0.10,
        };
        let cache = MultiLevelCache::new(l2.clone(), &config, 300);
        (l2, cache)
    }

    #[tokio::test]
    async fn test_set_then_get_is_served_by_l1() {
        let (l2, cache) = layered(100);
        cache
            .set("bills:year:2023", "[1,2]", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(cache.get("bills:year:2023").await.unwrap().as_deref(), Some("[1,2]"));
        assert_eq!(l2.reads(), 0);
        assert_eq!(cache.stats().l1_hits, 1);
    }

    #[tokio::test]
    async fn test_l1_eviction_falls_back_to_l2_and_promotes() {
        let (l2, cache) = layered(100);
        cache
            .set("legislators:roster", "[7]", Duration::from_secs(30))
            .await
            .unwrap();
        cache.invalidate_local("legislators:roster");

        assert_eq!(cache.get("legislators:roster").await.unwrap().as_deref(), Some("[7]"));
        assert_eq!(l2.reads(), 1);

        assert_eq!(cache.get("legislators:roster").await.unwrap().as_deref(), Some("[7]"));
        assert_eq!(l2.reads(), 1, "second read must come from the promoted L1 entry");
    }

    #[tokio::test]
    async fn test_miss_in_both_tiers() {
        let (_, cache) = layered(10);
        assert!(cache.get("votes:day:2020-01-01").await.unwrap().is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_l1_never_exceeds_max_items() {
        let (_, cache) = layered(20);
        for i in 0..250 {
            cache
                .set(&format!("bills:year:{i}"), "x", Duration::from_secs(60 + i))
                .await
                .unwrap();
            assert!(cache.l1_len() <= 20);
        }
        assert!(cache.stats().evictions > 0);
    }

    #[tokio::test]
    async fn test_overflow_evicts_nearest_expiry_first() {
        let (_, cache) = layered(10);
        cache.set("short", "s", Duration::from_secs(5)).await.unwrap();
        for i in 0..9 {
            cache
                .set(&format!("long:{i}"), "l", Duration::from_secs(600))
                .await
                .unwrap();
        }
        cache.set("newcomer", "n", Duration::from_secs(600)).await.unwrap();

        assert_eq!(cache.l1_len(), 10);
        assert!(cache.l1_get("short").is_none());
        assert!(cache.l1_get("long:0").is_some());
        assert!(cache.l1_get("newcomer").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_entries() {
        let (_, cache) = layered(100);
        let cache = Arc::new(cache);
        cache.set("votes:day:2024-01-02", "[]", Duration::from_secs(2)).await.unwrap();
        cache.set("legislators:roster", "[]", Duration::from_secs(120)).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = cache.spawn_sweeper(cancel.clone());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(cache.l1_len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_pattern_hits_both_tiers() {
        let (l2, cache) = layered(100);
        cache.set("bills:year:2022", "a", Duration::from_secs(60)).await.unwrap();
        cache.set("bills:year:2023", "b", Duration::from_secs(60)).await.unwrap();
        cache.set("legislators:roster", "c", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.delete_pattern("bills:*").await.unwrap(), 2);
        assert!(cache.get("bills:year:2022").await.unwrap().is_none());
        assert!(!l2.exists("bills:year:2023").await.unwrap());
        assert!(cache.get("legislators:roster").await.unwrap().is_some());
    }
}
