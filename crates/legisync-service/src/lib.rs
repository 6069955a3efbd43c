//! # legisync-service
//!
//! Synchronization orchestration for LegiSync. The services here decide
//! when a sync may run, make sure only one run of a kind is in flight
//! across processes, resume interrupted backfills from their checkpoints,
//! and hand cache side work to the background job processor.
//!
//! Services follow constructor injection: every port is provided at
//! construction time as an `Arc<dyn Trait>`.

pub mod app;
pub mod backfill;
pub mod context;
pub mod cron;
pub mod progress;
pub mod run;
pub mod scheduler;
pub mod strategic;
pub mod sync;
pub mod tasks;

pub use app::SyncApp;
pub use backfill::{BackfillStatus, SmartBackfillService};
pub use context::SyncContext;
pub use cron::CronTriggers;
pub use progress::ProgressTracker;
pub use scheduler::{SchedulerStatus, SmartSchedulerService};
pub use strategic::{BackfillPlanner, PlanReport, StrategicBackfillExecutor};
pub use sync::{BillSync, ExpenseSync, LegislatorSync, VoteSync, VoteYearOutcome};
pub use tasks::TaskRegistry;
