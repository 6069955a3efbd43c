//! Scheduler status snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use legisync_entity::execution::{Execution, SchedulerType};

/// What the durable records say about one scheduler type.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Cadence.
    pub scheduler_type: SchedulerType,
    /// Whether a run of this type is currently `running`.
    pub is_running: bool,
    /// The running execution, with its latest persisted counters.
    pub current: Option<Execution>,
    /// The most recent execution in any status.
    pub last: Option<Execution>,
    /// Next eligible run, from the last successful run.
    pub next_execution: Option<DateTime<Utc>>,
}
