//! Background job processor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Background job processor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the processor is started by the server.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of concurrent worker tasks.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Capacity of each bounded queue lane.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Upper bound on a single job execution, in seconds.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_seconds: u64,
    /// Retry budget applied when a job does not set its own.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Base of the exponential backoff, in milliseconds (`base * 2^retries`).
    #[serde(default = "default_backoff_base")]
    pub backoff_base_millis: u64,
    /// Upper bound on a single backoff delay, in seconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,
    /// How long `submit_async` waits for queue capacity, in seconds.
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_seconds: u64,
    /// How long shutdown waits for in-flight jobs, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: default_concurrency(),
            queue_size: default_queue_size(),
            job_timeout_seconds: default_job_timeout(),
            default_max_retries: default_max_retries(),
            backoff_base_millis: default_backoff_base(),
            max_backoff_seconds: default_max_backoff(),
            submit_timeout_seconds: default_submit_timeout(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

impl WorkerConfig {
    /// Validate pool sizing.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.concurrency == 0 {
            return Err(AppError::configuration("worker.concurrency must be > 0"));
        }
        if self.queue_size == 0 {
            return Err(AppError::configuration("worker.queue_size must be > 0"));
        }
        Ok(())
    }

    /// Per-job execution timeout.
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    /// Backoff base delay.
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_millis)
    }

    /// Backoff ceiling.
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_seconds)
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_queue_size() -> usize {
    100
}

fn default_job_timeout() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    300
}

fn default_submit_timeout() -> u64 {
    5
}

fn default_shutdown_grace() -> u64 {
    30
}
