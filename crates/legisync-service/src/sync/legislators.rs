//! Legislator roster sync.

use std::sync::Arc;

use tracing::{debug, info, warn};

use legisync_cache::keys;
use legisync_core::result::AppResult;
use legisync_core::traits::CacheJson;
use legisync_database::RecordFilter;
use legisync_entity::record::Legislator;
use legisync_upstream::{PageQuery, collect_pages};

use super::list_all;
use crate::context::SyncContext;

/// Syncs the legislator roster, the base data every other category
/// depends on.
#[derive(Debug, Clone)]
pub struct LegislatorSync {
    ctx: Arc<SyncContext>,
}

impl LegislatorSync {
    /// Creates a new legislator sync.
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    /// Fetch the whole roster from upstream.
    pub async fn fetch_all(&self) -> AppResult<Vec<Legislator>> {
        let source = &self.ctx.source;
        let per_page = self.ctx.page_size;
        let roster = collect_pages(per_page, self.ctx.max_pages, |page| {
            source.fetch_legislators(PageQuery { page, per_page })
        })
        .await?;
        Ok(roster)
    }

    /// Fetch, store, and cache the roster. Returns the number of rows written.
    pub async fn sync(&self) -> AppResult<u64> {
        let roster = self.fetch_all().await?;
        let written = self.ctx.legislators.upsert(&roster).await?;
        self.cache_roster(&roster).await;
        info!(fetched = roster.len(), written, "Legislator roster synced");
        Ok(written)
    }

    /// The roster for fan-out work: cache first, then storage, then upstream.
    pub async fn roster(&self) -> AppResult<Vec<Legislator>> {
        let key = keys::legislator_roster();
        match self.ctx.cache.get_json::<Vec<Legislator>>(&key).await {
            Ok(Some(roster)) if !roster.is_empty() => {
                debug!(legislators = roster.len(), "Roster served from cache");
                return Ok(roster);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Roster cache read failed"),
        }

        let stored = list_all(self.ctx.legislators.as_ref(), &RecordFilter::default()).await?;
        if !stored.is_empty() {
            self.cache_roster(&stored).await;
            return Ok(stored);
        }

        let fetched = self.fetch_all().await?;
        self.cache_roster(&fetched).await;
        Ok(fetched)
    }

    async fn cache_roster(&self, roster: &[Legislator]) {
        if let Err(e) = self
            .ctx
            .cache
            .set_json(&keys::legislator_roster(), roster, None)
            .await
        {
            warn!(error = %e, "Roster cache write failed");
        }
    }
}
