//! Synchronized legislative records.
//!
//! Every record carries the upstream's natural key; storage upserts on it,
//! so re-applying a batch converges to the same state.

pub mod bill;
pub mod expense;
pub mod legislator;
pub mod vote;

pub use bill::Bill;
pub use expense::Expense;
pub use legislator::Legislator;
pub use vote::Vote;

use crate::checkpoint::DataType;

/// A record that can be backfilled in checkpointed batches.
pub trait SyncRecord: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Data category of the record.
    const DATA_TYPE: DataType;

    /// Upstream natural key. Item sets are ordered by it so that a
    /// checkpoint offset names the same items on every resume.
    fn natural_key(&self) -> String;
}

/// Sort records into their deterministic resume order.
pub fn sort_for_resume<T: SyncRecord>(items: &mut [T]) {
    items.sort_by_cached_key(|item| item.natural_key());
}
