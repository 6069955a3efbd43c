//! Bill sync.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use legisync_core::result::AppResult;
use legisync_entity::record::Bill;
use legisync_upstream::{BillQuery, collect_pages};

use crate::context::SyncContext;

/// Syncs bills by presentation year.
#[derive(Debug, Clone)]
pub struct BillSync {
    ctx: Arc<SyncContext>,
}

impl BillSync {
    /// Creates a new bill sync.
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    /// Fetch the bills of a year, optionally only those presented on or
    /// after `since`.
    pub async fn fetch_year(&self, year: i32, since: Option<NaiveDate>) -> AppResult<Vec<Bill>> {
        let source = &self.ctx.source;
        let per_page = self.ctx.page_size;
        let bills = collect_pages(per_page, self.ctx.max_pages, |page| {
            source.fetch_bills(BillQuery {
                year,
                since,
                page,
                per_page,
            })
        })
        .await?;
        Ok(bills)
    }

    /// Fetch and store. Returns the number of rows written.
    pub async fn sync(&self, year: i32, since: Option<NaiveDate>) -> AppResult<u64> {
        let bills = self.fetch_year(year, since).await?;
        let written = self.ctx.bills.upsert(&bills).await?;
        info!(year, ?since, fetched = bills.len(), written, "Bills synced");
        Ok(written)
    }
}
