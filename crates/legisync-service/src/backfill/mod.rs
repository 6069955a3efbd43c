//! Historical backfill orchestration.

pub mod service;
pub mod status;

pub use service::SmartBackfillService;
pub use status::BackfillStatus;
