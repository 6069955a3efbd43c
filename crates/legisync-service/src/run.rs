//! Building blocks shared by the orchestrators: cross-process exclusivity,
//! stale-run recovery, panic containment, finalization, and side jobs.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use legisync_core::error::AppError;
use legisync_core::result::AppResult;
use legisync_core::traits::{AdvisoryLock, LockKey};
use legisync_database::ExecutionStore;
use legisync_entity::execution::{Execution, ExecutionKind, ExecutionStatus};
use legisync_entity::job::{Job, JobPayload, JobPriority};
use legisync_worker::BackgroundJobProcessor;

/// Reason recorded on running rows left behind by a dead process.
pub const ABANDONED: &str = "abandoned: the owning process stopped before finalizing the run";

/// The advisory lock guarding one execution scope.
#[derive(Debug, Clone)]
pub struct RunLock {
    lock: Arc<dyn AdvisoryLock>,
    key: LockKey,
    scope: String,
}

impl RunLock {
    /// Creates a lock handle for `scope`.
    pub fn new(lock: Arc<dyn AdvisoryLock>, key: LockKey, scope: impl Into<String>) -> Self {
        Self {
            lock,
            key,
            scope: scope.into(),
        }
    }

    /// Take the lock or fail with `AlreadyRunning`.
    pub async fn acquire(&self) -> AppResult<()> {
        if self.lock.try_acquire(self.key).await? {
            info!(scope = %self.scope, lock_key = %self.key, "Exclusivity acquired");
            Ok(())
        } else {
            Err(AppError::already_running(format!(
                "{} is already running in another session",
                self.scope
            )))
        }
    }

    /// Release the lock. Failures are logged; the database drops the lock
    /// with the session in any case.
    pub async fn release(&self) {
        match self.lock.release(self.key).await {
            Ok(()) => info!(scope = %self.scope, lock_key = %self.key, "Exclusivity released"),
            Err(e) => error!(scope = %self.scope, lock_key = %self.key, error = %e, "Failed to release exclusivity"),
        }
    }
}

/// Finalize a `running` row of `kind` as failed. Only called while holding
/// the kind's lock, so such a row cannot belong to a live run.
pub async fn recover_abandoned(store: &dyn ExecutionStore, kind: ExecutionKind) -> AppResult<Option<Uuid>> {
    let Some(mut stale) = store.get_running_execution(kind).await? else {
        return Ok(None);
    };
    warn!(
        execution_id = %stale.execution_id,
        kind = %kind,
        started_at = %stale.started_at,
        "Found abandoned running execution; marking it failed"
    );
    stale.finish(ExecutionStatus::Failed, Some(ABANDONED.to_string()), None)?;
    store.complete_execution(&stale).await?;
    Ok(Some(stale.execution_id))
}

/// Await `body`, converting a panic into an internal error.
pub async fn contain_panic<T, F>(body: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(AppError::internal(format!(
            "panic: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Record the terminal state of an execution.
pub async fn finalize(
    store: &dyn ExecutionStore,
    execution: &mut Execution,
    status: ExecutionStatus,
    error_message: Option<String>,
    next_execution: Option<chrono::DateTime<chrono::Utc>>,
) {
    if let Err(e) = execution.finish(status, error_message, next_execution) {
        error!(execution_id = %execution.execution_id, error = %e, "Execution already finalized");
        return;
    }
    match store.complete_execution(execution).await {
        Ok(()) => info!(
            execution_id = %execution.execution_id,
            kind = %execution.kind,
            status = %execution.status,
            duration_secs = ?execution.duration_seconds,
            records = execution.counters.total_records(),
            errors = execution.counters.errors,
            "Execution finished"
        ),
        Err(e) => error!(
            execution_id = %execution.execution_id,
            error = %e,
            "Failed to persist execution result"
        ),
    }
}

/// Optional hand-off of side work to the background processor.
#[derive(Debug, Clone, Default)]
pub struct SideJobs {
    processor: Option<Arc<BackgroundJobProcessor>>,
}

impl SideJobs {
    /// Side jobs submitted to `processor`.
    pub fn new(processor: Arc<BackgroundJobProcessor>) -> Self {
        Self {
            processor: Some(processor),
        }
    }

    /// Submit a job without waiting. A full queue or missing processor is
    /// logged and otherwise ignored.
    pub fn submit(&self, payload: JobPayload, max_retries: u32, priority: JobPriority) {
        let Some(processor) = &self.processor else {
            return;
        };
        let job = Job::new(payload, max_retries).with_priority(priority);
        let kind = job.kind();
        if let Err(e) = processor.submit(job) {
            warn!(job_kind = %kind, error = %e, "Side job not submitted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let result: AppResult<()> = contain_panic(async { panic!("boom") }).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind, legisync_core::error::ErrorKind::Internal);
        assert!(err.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_ordinary_results_pass_through() {
        let result = contain_panic(async { Ok::<_, AppError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
