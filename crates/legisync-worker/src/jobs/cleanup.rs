//! Checkpoint retention job.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use tracing;

use legisync_database::CheckpointStore;
use legisync_entity::job::{Job, JobKind, JobPayload};

use crate::executor::{JobExecutionError, JobHandler};

/// Deletes completed and failed checkpoints past their retention window.
#[derive(Debug)]
pub struct CleanupCheckpointsHandler {
    /// Checkpoint store
    checkpoints: Arc<dyn CheckpointStore>,
}

impl CleanupCheckpointsHandler {
    /// Create a new cleanup handler
    pub fn new(checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self { checkpoints }
    }
}

#[async_trait]
impl JobHandler for CleanupCheckpointsHandler {
    fn kind(&self) -> JobKind {
        JobKind::CleanupCheckpoints
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let JobPayload::CleanupCheckpoints { older_than_days } = &job.payload else {
            return Err(JobExecutionError::Permanent(format!(
                "Unexpected payload for cleanup job: {}",
                job.kind()
            )));
        };
        if *older_than_days == 0 {
            return Err(JobExecutionError::Permanent(
                "older_than_days must be at least 1".to_string(),
            ));
        }

        let cutoff = Utc::now() - Duration::days(i64::from(*older_than_days));
        tracing::info!(%cutoff, "Deleting finished checkpoints");

        let removed = self
            .checkpoints
            .delete_finished_before(cutoff)
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Checkpoint cleanup failed: {}", e)))?;

        tracing::info!("Removed {} finished checkpoints", removed);

        Ok(Some(serde_json::json!({
            "task": "cleanup_checkpoints",
            "cutoff": cutoff,
            "checkpoints_removed": removed,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::DateTime;
    use legisync_core::result::AppResult;
    use legisync_entity::checkpoint::{Checkpoint, CheckpointMetadata, DataType};
    use uuid::Uuid;

    #[derive(Debug, Default)]
    struct RecordingStore {
        cutoffs: Mutex<Vec<DateTime<Utc>>>,
    }

    #[async_trait]
    impl CheckpointStore for RecordingStore {
        async fn create(&self, data_type: DataType, metadata: CheckpointMetadata) -> AppResult<Checkpoint> {
            Ok(Checkpoint::new(data_type, metadata))
        }
        async fn update(&self, _checkpoint: &Checkpoint) -> AppResult<()> {
            Ok(())
        }
        async fn get(&self, id: Uuid) -> AppResult<Checkpoint> {
            Err(legisync_core::AppError::not_found(format!("checkpoint {id}")))
        }
        async fn list_pending(&self) -> AppResult<Vec<Checkpoint>> {
            Ok(Vec::new())
        }
        async fn latest_for_unit(&self, _data_type: DataType, _year: Option<i32>) -> AppResult<Option<Checkpoint>> {
            Ok(None)
        }
        async fn delete_finished_before(&self, before: DateTime<Utc>) -> AppResult<u64> {
            self.cutoffs.lock().unwrap().push(before);
            Ok(7)
        }
    }

    #[tokio::test]
    async fn test_cleanup_uses_retention_window() {
        let store = Arc::new(RecordingStore::default());
        let handler = CleanupCheckpointsHandler::new(store.clone());
        let job = Job::new(JobPayload::CleanupCheckpoints { older_than_days: 30 }, 0);

        let out = handler.execute(&job).await.unwrap().unwrap();
        assert_eq!(out["checkpoints_removed"], 7);

        let cutoff = store.cutoffs.lock().unwrap()[0];
        let age = Utc::now() - cutoff;
        assert!(age >= Duration::days(30) && age < Duration::days(30) + Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_zero_day_window_is_permanent_error() {
        let handler = CleanupCheckpointsHandler::new(Arc::new(RecordingStore::default()));
        let job = Job::new(JobPayload::CleanupCheckpoints { older_than_days: 0 }, 3);
        let err = handler.execute(&job).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
