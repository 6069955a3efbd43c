//! Shared ports for the category sync collaborators.

use std::sync::Arc;

use legisync_core::config::UpstreamConfig;
use legisync_core::traits::CacheProvider;
use legisync_database::RecordRepository;
use legisync_entity::record::{Bill, Expense, Legislator, Vote};
use legisync_upstream::LegislativeSource;

/// Everything a category sync needs: the upstream source, the record
/// repositories, and the cache.
///
/// Built once at startup and shared by the backfill and scheduler services.
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// Upstream open-data API.
    pub source: Arc<dyn LegislativeSource>,
    /// Legislator storage.
    pub legislators: Arc<dyn RecordRepository<Legislator>>,
    /// Bill storage.
    pub bills: Arc<dyn RecordRepository<Bill>>,
    /// Expense storage.
    pub expenses: Arc<dyn RecordRepository<Expense>>,
    /// Vote storage.
    pub votes: Arc<dyn RecordRepository<Vote>>,
    /// Read-through cache (usually the layered cache).
    pub cache: Arc<dyn CacheProvider>,
    /// Items requested per upstream page.
    pub page_size: u32,
    /// Upper bound on pages fetched per listing.
    pub max_pages: u32,
    /// Concurrent per-legislator expense fetches.
    pub expense_workers: usize,
}

impl SyncContext {
    /// Creates a new sync context.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn LegislativeSource>,
        legislators: Arc<dyn RecordRepository<Legislator>>,
        bills: Arc<dyn RecordRepository<Bill>>,
        expenses: Arc<dyn RecordRepository<Expense>>,
        votes: Arc<dyn RecordRepository<Vote>>,
        cache: Arc<dyn CacheProvider>,
        upstream: &UpstreamConfig,
        expense_workers: usize,
    ) -> Self {
        Self {
            source,
            legislators,
            bills,
            expenses,
            votes,
            cache,
            page_size: upstream.page_size.max(1),
            max_pages: upstream.max_pages.max(1),
            expense_workers: expense_workers.max(1),
        }
    }
}
