//! Checkpoint status and data type enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use legisync_core::error::AppError;

/// Category of synchronized data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sync_data_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Legislator roster.
    Legislators,
    /// Bills (propositions).
    Bills,
    /// Parliamentary quota expenses.
    Expenses,
    /// Plenary votes.
    Votes,
}

impl DataType {
    /// Planning priority (lower runs first in intent and logs).
    pub fn priority(&self) -> u8 {
        match self {
            Self::Legislators => 1,
            Self::Bills => 2,
            Self::Expenses => 3,
            Self::Votes => 4,
        }
    }

    /// Return the data type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legislators => "legislators",
            Self::Bills => "bills",
            Self::Expenses => "expenses",
            Self::Votes => "votes",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legislators" => Ok(Self::Legislators),
            "bills" => Ok(Self::Bills),
            "expenses" => Ok(Self::Expenses),
            "votes" => Ok(Self::Votes),
            other => Err(AppError::validation(format!("Unknown data type: '{other}'"))),
        }
    }
}

/// Lifecycle status of a checkpoint.
///
/// Transitions are monotonic: `pending -> in_progress -> {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "checkpoint_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    /// Planned, not yet picked up.
    Pending,
    /// Owned by an executor; progress is advancing.
    InProgress,
    /// Every item was durably written.
    Completed,
    /// Aborted; never mutated again.
    Failed,
}

impl CheckpointStatus {
    /// Whether the checkpoint still has work to resume.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    /// Whether the checkpoint is immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving to `next` respects the monotonic lifecycle.
    pub fn can_transition_to(&self, next: CheckpointStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Failed)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
        )
    }

    /// Return the status as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
