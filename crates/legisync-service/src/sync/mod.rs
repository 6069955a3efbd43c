//! Per-category sync collaborators.
//!
//! Each collaborator fetches one record category from the upstream source
//! and upserts it by natural key, so re-running any sync is harmless.

pub mod bills;
pub mod expenses;
pub mod legislators;
pub mod votes;

pub use bills::BillSync;
pub use expenses::{ExpenseBatch, ExpenseSync};
pub use legislators::LegislatorSync;
pub use votes::{VoteSync, VoteYearOutcome};

use legisync_core::result::AppResult;
use legisync_core::types::pagination::PageRequest;
use legisync_database::{RecordFilter, RecordRepository};
use legisync_entity::record::SyncRecord;

/// Rows read per page when listing stored records.
const LIST_PAGE: u64 = 500;

/// Read every stored record matching `filter`.
pub(crate) async fn list_all<T: SyncRecord>(
    repo: &dyn RecordRepository<T>,
    filter: &RecordFilter,
) -> AppResult<Vec<T>> {
    let mut page = PageRequest::new(LIST_PAGE, 0);
    let mut all = Vec::new();
    loop {
        let batch = repo.list(filter, &page).await?;
        let has_more = batch.has_more;
        all.extend(batch.items);
        if !has_more {
            return Ok(all);
        }
        page = page.next();
    }
}
