//! Storage ports consumed by the orchestration services.
//!
//! Services hold these as `Arc<dyn ...>` so the PostgreSQL repositories can
//! be swapped for in-memory fakes in tests.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use legisync_core::result::AppResult;
use legisync_core::types::pagination::{PageRequest, PageResponse};
use legisync_entity::checkpoint::{Checkpoint, CheckpointMetadata, DataType};
use legisync_entity::execution::{Execution, ExecutionKind, ShouldRun, SyncCounters};
use legisync_entity::record::SyncRecord;

/// Durable backfill checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync + Debug + 'static {
    /// Persist a new pending checkpoint.
    async fn create(&self, data_type: DataType, metadata: CheckpointMetadata)
    -> AppResult<Checkpoint>;

    /// Overwrite a checkpoint row. Rows already completed or failed are
    /// never rewritten; attempting it yields a conflict.
    async fn update(&self, checkpoint: &Checkpoint) -> AppResult<()>;

    /// Fetch a checkpoint by ID.
    async fn get(&self, id: Uuid) -> AppResult<Checkpoint>;

    /// Pending and in-progress checkpoints, oldest first.
    async fn list_pending(&self) -> AppResult<Vec<Checkpoint>>;

    /// Most recent checkpoint for a work unit, if any.
    async fn latest_for_unit(
        &self,
        data_type: DataType,
        year: Option<i32>,
    ) -> AppResult<Option<Checkpoint>>;

    /// Delete completed or failed checkpoints last touched before `before`.
    async fn delete_finished_before(&self, before: DateTime<Utc>) -> AppResult<u64>;

    /// Move a checkpoint to `in_progress` and persist it.
    async fn mark_started(&self, checkpoint: &mut Checkpoint) -> AppResult<()> {
        checkpoint.start()?;
        self.update(checkpoint).await
    }

    /// Move a checkpoint to `completed` and persist it.
    async fn mark_completed(&self, checkpoint: &mut Checkpoint) -> AppResult<()> {
        checkpoint.complete()?;
        self.update(checkpoint).await
    }

    /// Move a checkpoint to `failed` and persist it.
    async fn mark_failed(&self, checkpoint: &mut Checkpoint, error: &str) -> AppResult<()> {
        checkpoint.fail(error)?;
        self.update(checkpoint).await
    }
}

/// Durable run history for the backfill and scheduler services.
#[async_trait]
pub trait ExecutionStore: Send + Sync + Debug + 'static {
    /// Insert a running execution. Fails with `AlreadyRunning` if another
    /// execution of the same kind is still running.
    async fn create_execution(&self, execution: &Execution) -> AppResult<()>;

    /// Persist intermediate counters of a running execution.
    async fn update_progress(&self, execution_id: Uuid, counters: &SyncCounters) -> AppResult<()>;

    /// Persist the terminal state of an execution. Only a row that is still
    /// running is updated; a second finalization yields a conflict.
    async fn complete_execution(&self, execution: &Execution) -> AppResult<()>;

    /// Fetch an execution by ID.
    async fn get_execution(&self, execution_id: Uuid) -> AppResult<Option<Execution>>;

    /// The running execution of a kind, if any.
    async fn get_running_execution(&self, kind: ExecutionKind) -> AppResult<Option<Execution>>;

    /// The most recent execution of a kind, in any status.
    async fn last_execution(&self, kind: ExecutionKind) -> AppResult<Option<Execution>>;

    /// The most recent successful execution of a kind.
    async fn last_successful_execution(
        &self,
        kind: ExecutionKind,
    ) -> AppResult<Option<Execution>>;

    /// The most recent successful backfill whose year range contains
    /// `start_year..=end_year`.
    async fn find_successful_backfill(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> AppResult<Option<Execution>>;

    /// Executions newest first, optionally filtered by kind.
    async fn list_executions(
        &self,
        kind: Option<ExecutionKind>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Execution>>;

    /// Decide whether a run of `kind` is due. A run is refused while one is
    /// running, or if the last run, successful or not, started less than
    /// `min_interval_hours` ago.
    async fn should_execute(
        &self,
        kind: ExecutionKind,
        min_interval_hours: u32,
    ) -> AppResult<ShouldRun> {
        let running = self.get_running_execution(kind).await?;
        let last_run = self.last_execution(kind).await?;
        Ok(ShouldRun::by_interval(
            running.as_ref(),
            last_run.as_ref(),
            min_interval_hours,
            Utc::now(),
        ))
    }
}

/// Filters for record listings. Each repository applies the fields that
/// make sense for its record type and ignores the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Reference year.
    pub year: Option<i32>,
    /// Owning legislator.
    pub legislator_id: Option<i64>,
    /// Federative unit (legislators only).
    pub state: Option<String>,
    /// Earliest date, inclusive.
    pub date_from: Option<NaiveDate>,
    /// Latest date, inclusive.
    pub date_to: Option<NaiveDate>,
}

/// Idempotent storage of synchronized records.
#[async_trait]
pub trait RecordRepository<T: SyncRecord>: Send + Sync + Debug + 'static {
    /// Insert or overwrite records by natural key. Returns the number of
    /// distinct records written. Re-applying a batch converges to the same
    /// stored state.
    async fn upsert(&self, items: &[T]) -> AppResult<u64>;

    /// List stored records.
    async fn list(&self, filter: &RecordFilter, page: &PageRequest)
    -> AppResult<PageResponse<T>>;
}

/// Collapse records sharing a natural key, keeping the last occurrence.
///
/// PostgreSQL rejects an `ON CONFLICT DO UPDATE` that touches the same row
/// twice in one statement, and upstream pages occasionally repeat items.
pub fn dedup_last<T: SyncRecord>(items: &[T]) -> Vec<T> {
    let mut position: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let key = item.natural_key();
        match position.get(&key) {
            Some(&idx) => unique[idx] = item.clone(),
            None => {
                position.insert(key, unique.len());
                unique.push(item.clone());
            }
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use legisync_entity::record::Bill;

    fn bill(id: i64, summary: &str) -> Bill {
        Bill {
            id,
            bill_type: "PL".into(),
            number: id as i32,
            year: 2023,
            summary: Some(summary.into()),
            presented_at: None,
            synced_at: Utc::now(),
        }
    }

    #[test]
    fn test_dedup_keeps_last_occurrence_in_first_position() {
        let items = vec![bill(1, "old"), bill(2, "b"), bill(1, "new")];
        let unique = dedup_last(&items);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].id, 1);
        assert_eq!(unique[0].summary.as_deref(), Some("new"));
        assert_eq!(unique[1].id, 2);
    }
}
