//! Job executor: dispatches jobs to the handler registered for their kind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use legisync_core::error::AppError;
use legisync_entity::job::{Job, JobKind};

/// Trait for job handler implementations.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// The job kind this handler processes.
    fn kind(&self) -> JobKind;

    /// Execute the job.
    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError>;
}

/// Error from job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure, never retried.
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure, retried with backoff.
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Whether the processor may resubmit the job.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Dispatches jobs to the handler registered for their kind.
#[derive(Debug, Default)]
pub struct JobExecutor {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Create an executor with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same kind.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let kind = handler.kind();
        info!(job_kind = %kind, "Registered job handler");
        self.handlers.insert(kind, handler);
    }

    /// Execute a job by dispatching to its handler.
    pub async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let kind = job.kind();
        let handler = self.handlers.get(&kind).ok_or_else(|| {
            JobExecutionError::Permanent(format!("No handler registered for job kind '{kind}'"))
        })?;

        info!(
            job_id = %job.id,
            job_kind = %kind,
            attempt = job.attempt(),
            max_attempts = job.max_retries + 1,
            "Executing job"
        );

        handler.execute(job).await
    }

    /// Check if a handler is registered for a job kind.
    pub fn has_handler(&self, kind: JobKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legisync_entity::job::JobPayload;

    #[tokio::test]
    async fn test_missing_handler_is_permanent() {
        let executor = JobExecutor::new();
        let job = Job::new(JobPayload::CleanupCheckpoints { older_than_days: 30 }, 3);
        let err = executor.execute(&job).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
