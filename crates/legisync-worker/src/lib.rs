//! Background job processing for LegiSync.
//!
//! This crate provides:
//! - A bounded, two-lane job processor with a fixed worker pool
//! - Exponential backoff with jitter for failed jobs
//! - A job executor that dispatches typed payloads to handlers
//! - Built-in handlers for cache warming/invalidation, analytics refresh,
//!   and checkpoint retention

pub mod backoff;
pub mod executor;
pub mod jobs;
pub mod processor;

pub use backoff::Backoff;
pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use processor::{BackgroundJobProcessor, ProcessorStats};
