//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payload::{JobKind, JobPayload};
use super::status::JobPriority;

/// A unit of background work.
///
/// Retries keep the same `id`; each resubmission increments `retries`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Stable job identity across attempts.
    pub id: Uuid,
    /// Typed payload.
    pub payload: JobPayload,
    /// Queue lane selection.
    pub priority: JobPriority,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the current attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job finished (success or terminal failure).
    pub done_at: Option<DateTime<Utc>>,
    /// Attempts already retried.
    pub retries: u32,
    /// Retry budget; the job runs at most `max_retries + 1` times.
    pub max_retries: u32,
    /// Error of the latest failed attempt.
    pub last_error: Option<String>,
}

impl Job {
    /// Create a normal-priority job with the given retry budget.
    pub fn new(payload: JobPayload, max_retries: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            priority: JobPriority::Normal,
            created_at: Utc::now(),
            started_at: None,
            done_at: None,
            retries: 0,
            max_retries,
            last_error: None,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Dispatch key.
    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    /// Whether another attempt is allowed after a failure.
    pub fn can_retry(&self) -> bool {
        self.retries < self.max_retries
    }

    /// The attempt number currently running (1-based).
    pub fn attempt(&self) -> u32 {
        self.retries + 1
    }
}
