//! Execution entity model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use legisync_core::error::AppError;
use legisync_core::result::AppResult;

use super::config::ExecutionConfig;
use super::kind::{ExecutionKind, ExecutionStatus};

/// Per-category counters accumulated by a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
    /// Legislators upserted.
    pub legislators: u64,
    /// Bills upserted.
    pub bills: u64,
    /// Expenses upserted.
    pub expenses: u64,
    /// Votes upserted.
    pub votes: u64,
    /// Units (years, checkpoints, categories) that failed or were skipped.
    pub errors: u64,
    /// Years of votes fully processed.
    pub years_processed: u64,
    /// Days fetched through the day-by-day fallback.
    pub fallback_days: u64,
}

impl SyncCounters {
    /// Records written across all categories.
    pub fn total_records(&self) -> u64 {
        self.legislators + self.bills + self.expenses + self.votes
    }
}

/// Outcome of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShouldRun {
    /// Whether a new run may start.
    pub should_run: bool,
    /// Why.
    pub reason: String,
}

impl ShouldRun {
    /// Allow with a reason.
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            should_run: true,
            reason: reason.into(),
        }
    }

    /// Refuse with a reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            should_run: false,
            reason: reason.into(),
        }
    }

    /// Minimum-interval rule shared by every execution store.
    ///
    /// Refuses while a run of the kind is in flight, or while fewer than
    /// `min_interval_hours` have elapsed since the last run of the kind,
    /// whatever its outcome.
    pub fn by_interval(
        running: Option<&Execution>,
        last_run: Option<&Execution>,
        min_interval_hours: u32,
        now: DateTime<Utc>,
    ) -> Self {
        if let Some(running) = running {
            return Self::deny(format!(
                "execution {} has been running since {}",
                running.execution_id,
                running.started_at.to_rfc3339()
            ));
        }

        let Some(last) = last_run else {
            return Self::allow("no previous run");
        };

        let elapsed = now - last.started_at;
        let min_interval = Duration::hours(i64::from(min_interval_hours));
        if elapsed >= min_interval {
            Self::allow(format!(
                "last run ({}) at {} ({}h ago)",
                last.status,
                last.started_at.to_rfc3339(),
                elapsed.num_hours()
            ))
        } else {
            Self::deny(format!(
                "last run ({}) at {} is within the {min_interval_hours}h minimum interval",
                last.status,
                last.started_at.to_rfc3339()
            ))
        }
    }
}

/// One run of an orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Execution {
    /// Unique run identifier.
    pub execution_id: Uuid,
    /// What kind of run this is.
    pub kind: ExecutionKind,
    /// Current status.
    pub status: ExecutionStatus,
    /// Per-category counters.
    #[sqlx(json)]
    pub counters: SyncCounters,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run was finalized.
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration, set on finalization.
    pub duration_seconds: Option<i64>,
    /// Who triggered the run.
    pub triggered_by: String,
    /// Failure reason.
    pub error_message: Option<String>,
    /// Run parameters.
    #[sqlx(json)]
    pub config: ExecutionConfig,
    /// Next eligible run time (scheduler runs only).
    pub next_execution: Option<DateTime<Utc>>,
}

impl Execution {
    /// Create a running execution.
    pub fn start(kind: ExecutionKind, config: ExecutionConfig, triggered_by: impl Into<String>) -> Self {
        Self {
            execution_id: Uuid::now_v7(),
            kind,
            status: ExecutionStatus::Running,
            counters: SyncCounters::default(),
            started_at: Utc::now(),
            completed_at: None,
            duration_seconds: None,
            triggered_by: triggered_by.into(),
            error_message: None,
            config,
            next_execution: None,
        }
    }

    /// Whether the run is in flight.
    pub fn is_running(&self) -> bool {
        self.status == ExecutionStatus::Running
    }

    /// Finalize the run. Fails if it was already finalized.
    pub fn finish(
        &mut self,
        status: ExecutionStatus,
        error_message: Option<String>,
        next_execution: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        if !self.is_running() {
            return Err(AppError::conflict(format!(
                "Execution {} was already finalized as {}",
                self.execution_id, self.status
            )));
        }
        if status == ExecutionStatus::Running {
            return Err(AppError::validation("cannot finalize an execution as running"));
        }
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.duration_seconds = Some((now - self.started_at).num_seconds().max(0));
        self.error_message = error_message;
        self.next_execution = next_execution;
        Ok(())
    }
}
