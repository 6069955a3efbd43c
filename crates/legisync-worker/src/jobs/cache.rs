//! Cache warming and invalidation jobs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing;

use legisync_cache::keys;
use legisync_core::error::ErrorKind;
use legisync_core::traits::{CacheJson, CacheProvider};
use legisync_core::types::pagination::PageRequest;
use legisync_database::{RecordFilter, RecordRepository};
use legisync_entity::job::{CacheTarget, Job, JobKind, JobPayload};
use legisync_entity::record::{Bill, Legislator};

use crate::executor::{JobExecutionError, JobHandler};

/// Upper bound on rows read while warming one entry.
const WARM_MAX_ROWS: u64 = 5_000;

/// Pre-populates hot read paths from storage.
#[derive(Debug)]
pub struct WarmCacheHandler {
    /// Cache to populate
    cache: Arc<dyn CacheProvider>,
    /// Legislator repository
    legislators: Arc<dyn RecordRepository<Legislator>>,
    /// Bill repository
    bills: Arc<dyn RecordRepository<Bill>>,
    /// TTL for warmed entries
    ttl: Duration,
}

impl WarmCacheHandler {
    /// Create a new cache warming handler
    pub fn new(
        cache: Arc<dyn CacheProvider>,
        legislators: Arc<dyn RecordRepository<Legislator>>,
        bills: Arc<dyn RecordRepository<Bill>>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            legislators,
            bills,
            ttl,
        }
    }

    async fn warm(&self, target: &CacheTarget) -> Result<usize, JobExecutionError> {
        match target {
            CacheTarget::LegislatorRoster => {
                let rows = read_all(self.legislators.as_ref(), &RecordFilter::default()).await?;
                self.store(&keys::legislator_roster(), &rows).await?;
                Ok(rows.len())
            }
            CacheTarget::BillsForYear { year } => {
                let filter = RecordFilter {
                    year: Some(*year),
                    ..RecordFilter::default()
                };
                let rows = read_all(self.bills.as_ref(), &filter).await?;
                self.store(&keys::bills_for_year(*year), &rows).await?;
                Ok(rows.len())
            }
        }
    }

    async fn store<T: Serialize + Sync>(&self, key: &str, rows: &[T]) -> Result<(), JobExecutionError> {
        self.cache
            .set_json(key, rows, Some(self.ttl))
            .await
            .map_err(|e| match e.kind {
                ErrorKind::Serialization => {
                    JobExecutionError::Permanent(format!("Cannot serialize {key}: {e}"))
                }
                _ => JobExecutionError::Transient(format!("Cache write for {key} failed: {e}")),
            })
    }
}

async fn read_all<T: legisync_entity::record::SyncRecord>(
    repo: &dyn RecordRepository<T>,
    filter: &RecordFilter,
) -> Result<Vec<T>, JobExecutionError> {
    let mut page = PageRequest::new(500, 0);
    let mut rows = Vec::new();
    loop {
        let batch = repo
            .list(filter, &page)
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Storage read failed: {e}")))?;
        let has_more = batch.has_more;
        rows.extend(batch.items);
        if !has_more || rows.len() as u64 >= WARM_MAX_ROWS {
            break;
        }
        page = page.next();
    }
    Ok(rows)
}

#[async_trait]
impl JobHandler for WarmCacheHandler {
    fn kind(&self) -> JobKind {
        JobKind::WarmCache
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let JobPayload::WarmCache { targets } = &job.payload else {
            return Err(JobExecutionError::Permanent(format!(
                "Unexpected payload for warm-cache job: {}",
                job.kind()
            )));
        };

        let mut warmed = 0usize;
        for target in targets {
            let rows = self.warm(target).await?;
            tracing::debug!(?target, rows, "Warmed cache entry");
            warmed += 1;
        }

        tracing::info!("Warmed {} cache entries", warmed);
        Ok(Some(serde_json::json!({
            "task": "warm_cache",
            "entries_warmed": warmed,
        })))
    }
}

/// Deletes cache entries by pattern after their source data changed.
#[derive(Debug)]
pub struct InvalidateCacheHandler {
    /// Cache to invalidate
    cache: Arc<dyn CacheProvider>,
}

impl InvalidateCacheHandler {
    /// Create a new invalidation handler
    pub fn new(cache: Arc<dyn CacheProvider>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl JobHandler for InvalidateCacheHandler {
    fn kind(&self) -> JobKind {
        JobKind::InvalidateCache
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let JobPayload::InvalidateCache { patterns } = &job.payload else {
            return Err(JobExecutionError::Permanent(format!(
                "Unexpected payload for invalidate-cache job: {}",
                job.kind()
            )));
        };

        let mut removed = 0u64;
        for pattern in patterns {
            removed += self.cache.delete_pattern(pattern).await.map_err(|e| {
                JobExecutionError::Transient(format!("Invalidation of '{pattern}' failed: {e}"))
            })?;
        }

        tracing::info!(patterns = patterns.len(), removed, "Cache invalidated");
        Ok(Some(serde_json::json!({
            "task": "invalidate_cache",
            "keys_removed": removed,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use legisync_cache::memory::MemoryCacheProvider;
    use legisync_core::config::cache::MemoryCacheConfig;
    use legisync_core::result::AppResult;
    use legisync_core::types::pagination::PageResponse;

    #[derive(Debug)]
    struct FixedRepo<T>(Vec<T>);

    #[async_trait]
    impl<T: legisync_entity::record::SyncRecord> RecordRepository<T> for FixedRepo<T> {
        async fn upsert(&self, items: &[T]) -> AppResult<u64> {
            Ok(items.len() as u64)
        }

        async fn list(&self, _filter: &RecordFilter, page: &PageRequest) -> AppResult<PageResponse<T>> {
            Ok(PageResponse::slice(self.0.clone(), page))
        }
    }

    fn legislator(id: i64, name: &str) -> Legislator {
        Legislator {
            id,
            name: name.to_string(),
            party: None,
            state: Some("SP".into()),
            legislature_id: Some(57),
            email: None,
            photo_url: None,
            synced_at: Utc::now(),
        }
    }

    fn memory_cache() -> Arc<dyn CacheProvider> {
        Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig::default(), 60))
    }

    #[tokio::test]
    async fn test_warm_roster_writes_all_pages() {
        let cache = memory_cache();
        let roster: Vec<_> = (1..=1200).map(|i| legislator(i, "Dep")).collect();
        let handler = WarmCacheHandler::new(
            cache.clone(),
            Arc::new(FixedRepo(roster)),
            Arc::new(FixedRepo(Vec::<Bill>::new())),
            Duration::from_secs(60),
        );
        let job = Job::new(
            JobPayload::WarmCache {
                targets: vec![CacheTarget::LegislatorRoster, CacheTarget::BillsForYear { year: 2023 }],
            },
            0,
        );

        let out = handler.execute(&job).await.unwrap().unwrap();
        assert_eq!(out["entries_warmed"], 2);

        let raw = cache.get(&keys::legislator_roster()).await.unwrap().unwrap();
        let cached: Vec<Legislator> = serde_json::from_str(&raw).unwrap();
        assert_eq!(cached.len(), 1200);
        assert_eq!(cache.get(&keys::bills_for_year(2023)).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_invalidate_removes_matching_keys_only() {
        let cache = memory_cache();
        let ttl = Duration::from_secs(60);
        cache.set("bills:year:2022", "[]", ttl).await.unwrap();
        cache.set("bills:year:2023", "[]", ttl).await.unwrap();
        cache.set("legislators:roster", "[]", ttl).await.unwrap();

        let handler = InvalidateCacheHandler::new(cache.clone());
        let job = Job::new(
            JobPayload::InvalidateCache {
                patterns: vec![keys::bills_pattern()],
            },
            0,
        );
        handler.execute(&job).await.unwrap();

        assert!(!cache.exists("bills:year:2022").await.unwrap());
        assert!(!cache.exists("bills:year:2023").await.unwrap());
        assert!(cache.exists("legislators:roster").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_payload_is_permanent() {
        let handler = InvalidateCacheHandler::new(memory_cache());
        let job = Job::new(JobPayload::CleanupCheckpoints { older_than_days: 1 }, 3);
        assert!(!handler.execute(&job).await.unwrap_err().is_retryable());
    }
}
