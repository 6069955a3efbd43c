//! Orchestrator run entities (backfill and scheduler executions).

pub mod config;
pub mod kind;
pub mod model;

pub use config::{BackfillRequest, ExecutionConfig, SchedulerRequest};
pub use kind::{ExecutionKind, ExecutionStatus, SchedulerType};
pub use model::{Execution, ShouldRun, SyncCounters};
