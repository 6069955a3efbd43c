//! Backfill status snapshot.

use serde::Serialize;

use legisync_entity::checkpoint::Checkpoint;
use legisync_entity::execution::Execution;

/// What the durable records say about the historical backfill.
#[derive(Debug, Clone, Serialize)]
pub struct BackfillStatus {
    /// Whether a backfill execution is currently `running`.
    pub is_running: bool,
    /// The running execution, with its latest persisted counters.
    pub current: Option<Execution>,
    /// The most recent execution in any status.
    pub last: Option<Execution>,
    /// Checkpoints that a future run would resume.
    pub pending_checkpoints: Vec<Checkpoint>,
}
