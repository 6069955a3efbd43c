//! Analytics refresh job.
//!
//! Analytics computation lives outside this system; the job only tells the
//! collaborator that the data behind an execution changed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;
use uuid::Uuid;

use legisync_cache::keys;
use legisync_core::result::AppResult;
use legisync_core::traits::CacheProvider;
use legisync_entity::job::{Job, JobKind, JobPayload};

use crate::executor::{JobExecutionError, JobHandler};

/// Recomputes derived analytics after a sync.
#[async_trait]
pub trait AnalyticsRefresher: Send + Sync + std::fmt::Debug + 'static {
    /// Refresh whatever depends on the data written by `execution_id`.
    async fn refresh(&self, execution_id: Uuid) -> AppResult<u64>;
}

/// Drops cached analytics so the next read recomputes them.
#[derive(Debug)]
pub struct CacheAnalyticsRefresher {
    cache: Arc<dyn CacheProvider>,
}

impl CacheAnalyticsRefresher {
    /// Create a refresher over the shared cache.
    pub fn new(cache: Arc<dyn CacheProvider>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl AnalyticsRefresher for CacheAnalyticsRefresher {
    async fn refresh(&self, execution_id: Uuid) -> AppResult<u64> {
        let removed = self.cache.delete_pattern(&keys::analytics_pattern()).await?;
        tracing::debug!(%execution_id, removed, "Cached analytics dropped");
        Ok(removed)
    }
}

/// Handles `refresh_analytics` jobs.
#[derive(Debug)]
pub struct RefreshAnalyticsHandler {
    refresher: Arc<dyn AnalyticsRefresher>,
}

impl RefreshAnalyticsHandler {
    /// Create a new handler.
    pub fn new(refresher: Arc<dyn AnalyticsRefresher>) -> Self {
        Self { refresher }
    }
}

#[async_trait]
impl JobHandler for RefreshAnalyticsHandler {
    fn kind(&self) -> JobKind {
        JobKind::RefreshAnalytics
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let JobPayload::RefreshAnalytics { execution_id } = &job.payload else {
            return Err(JobExecutionError::Permanent(format!(
                "Unexpected payload for analytics job: {}",
                job.kind()
            )));
        };

        tracing::info!(%execution_id, "Refreshing analytics");
        let refreshed = self.refresher.refresh(*execution_id).await?;

        Ok(Some(serde_json::json!({
            "task": "refresh_analytics",
            "execution_id": execution_id,
            "entries_refreshed": refreshed,
        })))
    }
}
