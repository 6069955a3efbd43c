//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod backfill;
pub mod cache;
pub mod database;
pub mod logging;
pub mod scheduler;
pub mod upstream;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::backfill::BackfillConfig;
pub use self::cache::CacheConfig;
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::scheduler::{CategoryToggles, ScheduleConfig, SchedulerConfig};
pub use self::upstream::UpstreamConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Cache tier settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Background job processor settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Upstream legislative API settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Historical backfill settings.
    #[serde(default)]
    pub backfill: BackfillConfig,
    /// Periodic scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `LEGISYNC__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config/default", env)
    }

    /// Load configuration using an explicit base file path (without extension).
    pub fn load_from(base: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(base).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("LEGISYNC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject configurations that cannot possibly run.
    pub fn validate(&self) -> Result<(), AppError> {
        self.database.validate()?;
        self.worker.validate()?;
        self.backfill.validate()?;
        self.scheduler.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}
