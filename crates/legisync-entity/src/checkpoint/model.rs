//! Checkpoint entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use legisync_core::error::AppError;
use legisync_core::result::AppResult;

use super::status::{CheckpointStatus, DataType};

/// Progress of one unit of backfill work.
///
/// Always rewritten whole; never applied as a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointProgress {
    /// Total items in the unit, once fetched.
    pub total_items: Option<u64>,
    /// Items durably written, counted from the start of the ordered item set.
    pub processed_items: u64,
    /// Items in batches that exhausted their retries.
    pub failed_items: u64,
    /// Natural key of the last durably written item.
    pub last_processed_id: Option<String>,
}

impl CheckpointProgress {
    /// Items still to write, if the total is known.
    pub fn remaining(&self) -> Option<u64> {
        self.total_items
            .map(|total| total.saturating_sub(self.processed_items))
    }
}

/// What a checkpoint covers and why it was planned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Year covered (`None` for the legislator roster).
    pub year: Option<i32>,
    /// Planning priority copied from the data type.
    pub priority: u8,
    /// Execution that planned the checkpoint, if any.
    pub execution_id: Option<Uuid>,
}

/// Durable record of progress for one unit of backfill work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Checkpoint {
    /// Unique checkpoint identifier.
    pub id: Uuid,
    /// Data category of the unit.
    pub data_type: DataType,
    /// Lifecycle status.
    pub status: CheckpointStatus,
    /// Progress counters.
    #[sqlx(json)]
    pub progress: CheckpointProgress,
    /// Unit description.
    #[sqlx(json)]
    pub metadata: CheckpointMetadata,
    /// When the checkpoint was planned.
    pub created_at: DateTime<Utc>,
    /// Last write.
    pub updated_at: DateTime<Utc>,
    /// When an executor first picked it up.
    pub started_at: Option<DateTime<Utc>>,
    /// When it reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason.
    pub error_message: Option<String>,
}

impl Checkpoint {
    /// Create a pending checkpoint.
    pub fn new(data_type: DataType, metadata: CheckpointMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            data_type,
            status: CheckpointStatus::Pending,
            progress: CheckpointProgress::default(),
            metadata,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// Human-readable unit label, e.g. `bills/2023`.
    pub fn unit_label(&self) -> String {
        match self.metadata.year {
            Some(year) => format!("{}/{year}", self.data_type),
            None => self.data_type.to_string(),
        }
    }

    /// Whether this checkpoint covers the given unit.
    pub fn covers(&self, data_type: DataType, year: Option<i32>) -> bool {
        self.data_type == data_type && self.metadata.year == year
    }

    /// Move to `in_progress`. Re-starting an in-progress checkpoint (a resume) is a no-op.
    pub fn start(&mut self) -> AppResult<()> {
        if self.status == CheckpointStatus::InProgress {
            return Ok(());
        }
        self.transition(CheckpointStatus::InProgress)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Move to `completed`.
    pub fn complete(&mut self) -> AppResult<()> {
        self.transition(CheckpointStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Move to `failed` with a reason.
    pub fn fail(&mut self, error: impl Into<String>) -> AppResult<()> {
        self.transition(CheckpointStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error.into());
        Ok(())
    }

    /// Record the size of the unit's item set.
    ///
    /// The total never drops below what was already written, so
    /// `processed_items <= total_items` holds even when upstream data shrinks
    /// between a crash and its resume.
    pub fn record_total(&mut self, total: u64) -> AppResult<()> {
        self.ensure_mutable()?;
        self.progress.total_items = Some(total.max(self.progress.processed_items));
        self.touch();
        Ok(())
    }

    /// Advance past a durably written batch.
    pub fn advance(&mut self, written: u64, last_id: Option<String>) -> AppResult<()> {
        self.ensure_mutable()?;
        let processed = self.progress.processed_items + written;
        if let Some(total) = self.progress.total_items {
            if processed > total {
                return Err(AppError::conflict(format!(
                    "Checkpoint {} would exceed its total ({processed} > {total})",
                    self.id
                )));
            }
        }
        self.progress.processed_items = processed;
        if last_id.is_some() {
            self.progress.last_processed_id = last_id;
        }
        self.touch();
        Ok(())
    }

    /// Count items in a batch that exhausted its retries.
    pub fn record_failed_items(&mut self, failed: u64) -> AppResult<()> {
        self.ensure_mutable()?;
        self.progress.failed_items += failed;
        self.touch();
        Ok(())
    }

    /// Carry the position of a failed attempt at the same unit into this
    /// fresh checkpoint. Failed-item counts start over.
    pub fn seed_from(&mut self, previous: &Checkpoint) -> AppResult<()> {
        self.ensure_mutable()?;
        if !previous.covers(self.data_type, self.metadata.year) {
            return Err(AppError::conflict(format!(
                "Checkpoint {} ({}) cannot seed {}",
                previous.id,
                previous.unit_label(),
                self.unit_label()
            )));
        }
        self.progress.processed_items = previous.progress.processed_items;
        self.progress.last_processed_id = previous.progress.last_processed_id.clone();
        self.touch();
        Ok(())
    }

    /// Move the processed count to `position` in the current upstream
    /// listing, which may differ from the stored count when records were
    /// added or removed before the resume key.
    pub fn resume_at(&mut self, position: u64) -> AppResult<()> {
        self.ensure_mutable()?;
        self.progress.processed_items = position;
        if let Some(total) = self.progress.total_items {
            self.progress.total_items = Some(total.max(position));
        }
        self.touch();
        Ok(())
    }

    fn transition(&mut self, next: CheckpointStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::conflict(format!(
                "Checkpoint {} cannot move from {} to {next}",
                self.id, self.status
            )));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    fn ensure_mutable(&self) -> AppResult<()> {
        if self.status.is_terminal() {
            return Err(AppError::conflict(format!(
                "Checkpoint {} is {} and can no longer change",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bills_2023() -> Checkpoint {
        Checkpoint::new(
            DataType::Bills,
            CheckpointMetadata {
                year: Some(2023),
                priority: DataType::Bills.priority(),
                execution_id: None,
            },
        )
    }

    #[test]
    fn test_lifecycle_is_monotonic() {
        let mut cp = bills_2023();
        cp.start().unwrap();
        cp.start().unwrap();
        cp.complete().unwrap();
        assert!(cp.start().is_err());
        assert!(cp.fail("late").is_err());
        assert_eq!(cp.status, CheckpointStatus::Completed);
    }

    #[test]
    fn test_pending_cannot_complete() {
        let mut cp = bills_2023();
        assert!(cp.complete().is_err());
        cp.fail("plan rejected").unwrap();
        assert_eq!(cp.error_message.as_deref(), Some("plan rejected"));
    }

    #[test]
    fn test_advance_respects_total() {
        let mut cp = bills_2023();
        cp.start().unwrap();
        cp.record_total(150).unwrap();
        cp.advance(100, Some("b-100".into())).unwrap();
        assert_eq!(cp.progress.remaining(), Some(50));
        assert!(cp.advance(51, None).is_err());
        cp.advance(50, Some("b-150".into())).unwrap();
        assert_eq!(cp.progress.last_processed_id.as_deref(), Some("b-150"));
    }

    #[test]
    fn test_total_never_below_processed() {
        let mut cp = bills_2023();
        cp.start().unwrap();
        cp.record_total(10).unwrap();
        cp.advance(8, None).unwrap();
        cp.record_total(5).unwrap();
        assert_eq!(cp.progress.total_items, Some(8));
    }

    #[test]
    fn test_unit_label() {
        assert_eq!(bills_2023().unit_label(), "bills/2023");
        let roster = Checkpoint::new(DataType::Legislators, CheckpointMetadata::default());
        assert_eq!(roster.unit_label(), "legislators");
    }

    #[test]
    fn test_seed_from_failed_attempt() {
        let mut failed = bills_2023();
        failed.start().unwrap();
        failed.record_total(5).unwrap();
        failed.advance(2, Some("000000000002".into())).unwrap();
        failed.record_failed_items(3).unwrap();
        failed.fail("upstream timeout").unwrap();

        let mut retry = bills_2023();
        retry.seed_from(&failed).unwrap();
        assert_eq!(retry.progress.processed_items, 2);
        assert_eq!(retry.progress.last_processed_id.as_deref(), Some("000000000002"));
        assert_eq!(retry.progress.failed_items, 0);
        assert_eq!(retry.progress.total_items, None);
        assert_eq!(retry.status, CheckpointStatus::Pending);

        let mut votes = Checkpoint::new(DataType::Votes, CheckpointMetadata::default());
        assert!(votes.seed_from(&failed).is_err());
    }

    #[test]
    fn test_resume_at_repositions_progress() {
        let mut cp = bills_2023();
        cp.start().unwrap();
        cp.record_total(5).unwrap();
        cp.advance(3, Some("000000000003".into())).unwrap();
        cp.resume_at(2).unwrap();
        cp.record_total(4).unwrap();
        assert_eq!(cp.progress.processed_items, 2);
        assert_eq!(cp.progress.remaining(), Some(2));
        cp.complete().unwrap();
        assert!(cp.resume_at(0).is_err());
    }
}
