//! Vote sync with day-by-day fallback.
//!
//! A whole-year vote listing is heavy enough that the upstream gateway
//! regularly times out on it. When that happens the window is re-fetched
//! one day at a time, with a pause between days.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use legisync_core::error::AppError;
use legisync_core::result::AppResult;
use legisync_entity::record::Vote;
use legisync_upstream::{VoteQuery, collect_pages};

use crate::context::SyncContext;

/// Outcome of syncing a window of votes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteYearOutcome {
    /// Votes written.
    pub votes: u64,
    /// Whether the day-by-day fallback was used.
    pub used_fallback: bool,
    /// Days fetched through the fallback.
    pub fallback_days: u64,
    /// Fallback days that still failed.
    pub failed_days: u64,
}

/// Syncs plenary votes.
#[derive(Debug, Clone)]
pub struct VoteSync {
    ctx: Arc<SyncContext>,
}

impl VoteSync {
    /// Creates a new vote sync.
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    /// Fetch the votes held between two dates, inclusive.
    pub async fn fetch_range(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<Vote>> {
        let source = &self.ctx.source;
        let per_page = self.ctx.page_size;
        let votes = collect_pages(per_page, self.ctx.max_pages, |page| {
            source.fetch_votes(VoteQuery {
                start,
                end,
                page,
                per_page,
            })
        })
        .await?;
        Ok(votes)
    }

    /// Fetch and store a date range in one request sequence.
    pub async fn sync_range(&self, start: NaiveDate, end: NaiveDate) -> AppResult<u64> {
        let votes = self.fetch_range(start, end).await?;
        let written = self.ctx.votes.upsert(&votes).await?;
        debug!(%start, %end, fetched = votes.len(), written, "Votes synced");
        Ok(written)
    }

    /// Sync a window, falling back to one request per day if the whole
    /// window hits a gateway timeout. Other errors are returned as is.
    pub async fn sync_window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        day_delay: Duration,
        cancel: &CancellationToken,
    ) -> AppResult<VoteYearOutcome> {
        match self.sync_range(start, end).await {
            Ok(votes) => Ok(VoteYearOutcome {
                votes,
                ..VoteYearOutcome::default()
            }),
            Err(e) if e.is_gateway_timeout() => {
                warn!(%start, %end, error = %e, "Vote window timed out; falling back to day-by-day");
                self.sync_days(start, end, day_delay, cancel).await
            }
            Err(e) => Err(e),
        }
    }

    /// Sync every day of `year` up to today.
    pub async fn sync_year(
        &self,
        year: i32,
        day_delay: Duration,
        cancel: &CancellationToken,
    ) -> AppResult<VoteYearOutcome> {
        let (start, end) = year_window(year, Utc::now().date_naive())
            .ok_or_else(|| AppError::validation(format!("year {year} has no days to sync")))?;
        let outcome = self.sync_window(start, end, day_delay, cancel).await?;
        info!(
            year,
            votes = outcome.votes,
            fallback = outcome.used_fallback,
            failed_days = outcome.failed_days,
            "Vote year synced"
        );
        Ok(outcome)
    }

    /// One request per day. A failed day is logged and skipped.
    pub async fn sync_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        day_delay: Duration,
        cancel: &CancellationToken,
    ) -> AppResult<VoteYearOutcome> {
        let mut outcome = VoteYearOutcome {
            used_fallback: true,
            ..VoteYearOutcome::default()
        };

        for day in start.iter_days().take_while(|d| *d <= end) {
            if cancel.is_cancelled() {
                return Err(AppError::cancelled(format!("vote sync cancelled at {day}")));
            }
            match self.sync_range(day, day).await {
                Ok(votes) => outcome.votes += votes,
                Err(e) => {
                    warn!(%day, error = %e, "Vote day failed; skipping");
                    outcome.failed_days += 1;
                }
            }
            outcome.fallback_days += 1;

            if day < end && !day_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(AppError::cancelled(format!("vote sync cancelled after {day}")));
                    }
                    _ = tokio::time::sleep(day_delay) => {}
                }
            }
        }
        Ok(outcome)
    }
}

/// First and last day of `year` to sync, capped at `today`. `None` for
/// future years.
pub fn year_window(year: i32, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    if start > today {
        return None;
    }
    let end = if year == today.year() {
        today
    } else {
        NaiveDate::from_ymd_opt(year, 12, 31)?
    };
    Some((start, end))
}
