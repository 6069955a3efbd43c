//! Periodic incremental sync scheduling.

pub mod cadence;
pub mod service;
pub mod status;

pub use cadence::{lookback_window, months_in_window, next_execution, schedule_for};
pub use service::SmartSchedulerService;
pub use status::SchedulerStatus;
