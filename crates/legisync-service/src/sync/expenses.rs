//! Expense sync, fanned out per legislator.

use std::sync::Arc;

use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use legisync_core::error::AppError;
use legisync_core::result::AppResult;
use legisync_entity::record::Expense;
use legisync_upstream::{ExpenseQuery, collect_pages};

use super::legislators::LegislatorSync;
use crate::context::SyncContext;

/// Result of fetching one year (or month) of expenses for the whole roster.
#[derive(Debug, Clone, Default)]
pub struct ExpenseBatch {
    /// Expenses of every legislator that was fetched successfully.
    pub expenses: Vec<Expense>,
    /// Legislators whose expenses could not be fetched.
    pub failed_legislators: Vec<i64>,
}

impl ExpenseBatch {
    /// Whether every legislator was fetched.
    pub fn is_complete(&self) -> bool {
        self.failed_legislators.is_empty()
    }

    /// Error describing the missing legislators, if any.
    pub fn incomplete_error(&self) -> Option<AppError> {
        if self.is_complete() {
            return None;
        }
        Some(AppError::external_service(format!(
            "expenses of {} legislators could not be fetched",
            self.failed_legislators.len()
        )))
    }
}

/// Syncs quota expenses.
#[derive(Debug, Clone)]
pub struct ExpenseSync {
    ctx: Arc<SyncContext>,
    legislators: LegislatorSync,
}

impl ExpenseSync {
    /// Creates a new expense sync.
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        let legislators = LegislatorSync::new(Arc::clone(&ctx));
        Self { ctx, legislators }
    }

    /// Fetch the expenses of every legislator on the roster for a year,
    /// optionally one month, with `expense_workers` requests in flight.
    pub async fn fetch_year(
        &self,
        year: i32,
        month: Option<u32>,
        cancel: &CancellationToken,
    ) -> AppResult<ExpenseBatch> {
        let roster = self.legislators.roster().await?;
        let workers = self.ctx.expense_workers;

        let legislator_ids: Vec<i64> = roster.iter().map(|l| l.id).collect();

        let results: Vec<(i64, AppResult<Vec<Expense>>)> = stream::iter(legislator_ids)
            .map(|legislator_id| async move {
                if cancel.is_cancelled() {
                    return (legislator_id, Err(AppError::cancelled("expense sync cancelled")));
                }
                (legislator_id, self.fetch_legislator(legislator_id, year, month).await)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(AppError::cancelled("expense sync cancelled"));
        }

        let mut batch = ExpenseBatch::default();
        for (legislator_id, result) in results {
            match result {
                Ok(expenses) => batch.expenses.extend(expenses),
                Err(e) => {
                    warn!(legislator_id, year, ?month, error = %e, "Expense fetch failed");
                    batch.failed_legislators.push(legislator_id);
                }
            }
        }
        Ok(batch)
    }

    /// Fetch and store. Writes whatever was fetched, then fails if any
    /// legislator was missed.
    pub async fn sync(&self, year: i32, month: Option<u32>, cancel: &CancellationToken) -> AppResult<u64> {
        let batch = self.fetch_year(year, month, cancel).await?;
        let written = self.ctx.expenses.upsert(&batch.expenses).await?;
        info!(
            year,
            ?month,
            fetched = batch.expenses.len(),
            written,
            failed_legislators = batch.failed_legislators.len(),
            "Expenses synced"
        );
        match batch.incomplete_error() {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    async fn fetch_legislator(&self, legislator_id: i64, year: i32, month: Option<u32>) -> AppResult<Vec<Expense>> {
        let source = &self.ctx.source;
        let per_page = self.ctx.page_size;
        let expenses = collect_pages(per_page, self.ctx.max_pages, |page| {
            source.fetch_expenses(ExpenseQuery {
                legislator_id,
                year,
                month,
                page,
                per_page,
            })
        })
        .await?;
        Ok(expenses)
    }
}
