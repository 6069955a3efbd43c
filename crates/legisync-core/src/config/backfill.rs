//! Historical backfill configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Tuning for the checkpointed historical backfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// First year backfilled when a request does not name one.
    #[serde(default = "default_start_year")]
    pub default_start_year: i32,
    /// Last year backfilled when a request does not name one (current year if unset).
    #[serde(default)]
    pub default_end_year: Option<i32>,
    /// Earliest year accepted by validation.
    #[serde(default = "default_min_year")]
    pub min_year: i32,
    /// Items written per bulk upsert.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Retries per batch before the checkpoint is aborted.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Linear retry step in milliseconds (`retry_delay * attempt`).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_millis: u64,
    /// Concurrent year workers for vote synchronization.
    #[serde(default = "default_vote_workers")]
    pub vote_workers: usize,
    /// Pause between day-by-day fallback requests, in milliseconds.
    #[serde(default = "default_day_delay")]
    pub day_delay_millis: u64,
    /// Pause between successful batches, in milliseconds.
    #[serde(default)]
    pub batch_delay_millis: u64,
    /// Finished checkpoints older than this are deleted by the cleanup job.
    #[serde(default = "default_retention")]
    pub checkpoint_retention_days: u32,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            default_start_year: default_start_year(),
            default_end_year: None,
            min_year: default_min_year(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_delay_millis: default_retry_delay(),
            vote_workers: default_vote_workers(),
            day_delay_millis: default_day_delay(),
            batch_delay_millis: 0,
            checkpoint_retention_days: default_retention(),
        }
    }
}

impl BackfillConfig {
    /// Validate batch and pool sizing.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::configuration("backfill.batch_size must be > 0"));
        }
        if self.vote_workers == 0 {
            return Err(AppError::configuration("backfill.vote_workers must be > 0"));
        }
        Ok(())
    }

    /// Linear retry step.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_millis)
    }

    /// Day-by-day fallback pacing.
    pub fn day_delay(&self) -> Duration {
        Duration::from_millis(self.day_delay_millis)
    }

    /// Inter-batch pacing.
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_millis)
    }
}

fn default_start_year() -> i32 {
    2019
}

fn default_min_year() -> i32 {
    2000
}

fn default_batch_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2000
}

fn default_vote_workers() -> usize {
    3
}

fn default_day_delay() -> u64 {
    500
}

fn default_retention() -> u32 {
    30
}
