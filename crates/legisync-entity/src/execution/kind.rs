//! Execution kind, scheduler type, and status enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use legisync_core::error::AppError;

/// A named recurring-sync cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerType {
    /// Once a day at a fixed hour.
    Daily,
    /// Every few hours, lighter scope.
    Fast,
    /// Operator-triggered.
    Manual,
}

impl SchedulerType {
    /// Every scheduler type.
    pub const ALL: [SchedulerType; 3] = [Self::Daily, Self::Fast, Self::Manual];

    /// Execution kind recorded for runs of this type.
    pub fn kind(&self) -> ExecutionKind {
        match self {
            Self::Daily => ExecutionKind::SchedulerDaily,
            Self::Fast => ExecutionKind::SchedulerFast,
            Self::Manual => ExecutionKind::SchedulerManual,
        }
    }

    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Fast => "fast",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SchedulerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SchedulerType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "fast" => Ok(Self::Fast),
            "manual" => Ok(Self::Manual),
            other => Err(AppError::validation(format!(
                "Unknown scheduler type: '{other}'. Supported: daily, fast, manual"
            ))),
        }
    }
}

/// What an execution record describes. One run of a kind may be `running` at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "execution_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// Multi-year historical backfill.
    HistoricalBackfill,
    /// Daily scheduler run.
    SchedulerDaily,
    /// Fast scheduler run.
    SchedulerFast,
    /// Manual scheduler run.
    SchedulerManual,
}

impl ExecutionKind {
    /// Scheduler type, for scheduler kinds.
    pub fn scheduler_type(&self) -> Option<SchedulerType> {
        match self {
            Self::HistoricalBackfill => None,
            Self::SchedulerDaily => Some(SchedulerType::Daily),
            Self::SchedulerFast => Some(SchedulerType::Fast),
            Self::SchedulerManual => Some(SchedulerType::Manual),
        }
    }

    /// Return the kind as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HistoricalBackfill => "historical_backfill",
            Self::SchedulerDaily => "scheduler_daily",
            Self::SchedulerFast => "scheduler_fast",
            Self::SchedulerManual => "scheduler_manual",
        }
    }
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of an orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "execution_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// In flight.
    Running,
    /// Every unit succeeded.
    Success,
    /// Aborted by an error or panic.
    Failed,
    /// Finished with some units skipped or failed.
    Partial,
}

impl ExecutionStatus {
    /// Whether the run has been finalized.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
