//! Checkpointed historical backfill: planning and execution.

pub mod executor;
pub mod planner;

pub use executor::{FailedUnit, PlanReport, StrategicBackfillExecutor};
pub use planner::{BackfillPlan, BackfillPlanner, PlannedUnit};
