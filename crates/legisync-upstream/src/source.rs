//! The upstream data port.

use std::fmt::Debug;
use std::future::Future;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::warn;

use legisync_entity::record::{Bill, Expense, Legislator, Vote};

use crate::error::UpstreamError;

/// One page of a paged listing (pages start at 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub per_page: u32,
}

/// Bills presented in a year, optionally only those presented since a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillQuery {
    pub year: i32,
    pub since: Option<NaiveDate>,
    pub page: u32,
    pub per_page: u32,
}

/// Expenses of one legislator in a year, optionally one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpenseQuery {
    pub legislator_id: i64,
    pub year: i32,
    pub month: Option<u32>,
    pub page: u32,
    pub per_page: u32,
}

/// Votes held between two dates, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub page: u32,
    pub per_page: u32,
}

/// Read access to the legislative open-data API.
///
/// Each call fetches one page; a page shorter than `per_page` is the last.
#[async_trait]
pub trait LegislativeSource: Send + Sync + Debug + 'static {
    /// Current legislator roster.
    async fn fetch_legislators(&self, page: PageQuery) -> Result<Vec<Legislator>, UpstreamError>;

    /// Bills by presentation year.
    async fn fetch_bills(&self, query: BillQuery) -> Result<Vec<Bill>, UpstreamError>;

    /// Quota expenses of one legislator.
    async fn fetch_expenses(&self, query: ExpenseQuery) -> Result<Vec<Expense>, UpstreamError>;

    /// Plenary votes in a date range.
    async fn fetch_votes(&self, query: VoteQuery) -> Result<Vec<Vote>, UpstreamError>;
}

/// Fetch pages `1..=max_pages` until a short page signals the end.
pub async fn collect_pages<T, F, Fut>(
    per_page: u32,
    max_pages: u32,
    mut fetch: F,
) -> Result<Vec<T>, UpstreamError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, UpstreamError>>,
{
    let mut all = Vec::new();
    for page in 1..=max_pages {
        let items = fetch(page).await?;
        let last = (items.len() as u32) < per_page;
        all.extend(items);
        if last {
            return Ok(all);
        }
    }
    warn!(max_pages, collected = all.len(), "Stopped paging at the page limit");
    Ok(all)
}
