//! Periodic sync scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Longest incremental window; anything older is backfill territory.
pub const MAX_LOOKBACK_DAYS: u32 = 366;

/// Which sync categories a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryToggles {
    /// Legislator roster.
    #[serde(default = "default_true")]
    pub legislators: bool,
    /// Bills.
    #[serde(default = "default_true")]
    pub bills: bool,
    /// Legislator expenses.
    #[serde(default = "default_true")]
    pub expenses: bool,
    /// Plenary votes.
    #[serde(default = "default_true")]
    pub votes: bool,
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self::all()
    }
}

impl CategoryToggles {
    /// Every category enabled.
    pub fn all() -> Self {
        Self {
            legislators: true,
            bills: true,
            expenses: true,
            votes: true,
        }
    }

    /// Whether at least one category is enabled.
    pub fn any(&self) -> bool {
        self.legislators || self.bills || self.expenses || self.votes
    }
}

/// Cadence and scope for one scheduler type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Whether the cron trigger for this type is registered.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum hours between two runs, whatever their outcome.
    pub min_interval_hours: u32,
    /// Hour of day (UTC) of the next daily run.
    #[serde(default = "default_run_hour")]
    pub run_hour_utc: u32,
    /// Hours between runs for interval cadences.
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u32,
    /// Six-field cron expression for the trigger (seconds first).
    #[serde(default)]
    pub cron: Option<String>,
    /// Days looked back for incremental windows.
    pub lookback_days: u32,
    /// Categories synchronized.
    #[serde(default)]
    pub categories: CategoryToggles,
}

/// All scheduler types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Once-a-day full incremental sync.
    #[serde(default = "default_daily")]
    pub daily: ScheduleConfig,
    /// Frequent light sync.
    #[serde(default = "default_fast")]
    pub fast: ScheduleConfig,
    /// Operator-triggered sync.
    #[serde(default = "default_manual")]
    pub manual: ScheduleConfig,
    /// Concurrent per-legislator workers for expense sync.
    #[serde(default = "default_expense_workers")]
    pub expense_workers: usize,
    /// Cron expression for checkpoint retention cleanup.
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,
}

impl ScheduleConfig {
    fn validate(&self, name: &str) -> Result<(), AppError> {
        if self.run_hour_utc > 23 {
            return Err(AppError::configuration(format!(
                "scheduler.{name}.run_hour_utc must be within 0..=23, got {}",
                self.run_hour_utc
            )));
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(AppError::configuration(format!(
                "scheduler.{name}.lookback_days must be at most {MAX_LOOKBACK_DAYS}, got {}",
                self.lookback_days
            )));
        }
        Ok(())
    }
}

impl SchedulerConfig {
    /// Reject cadences the scheduler cannot honor.
    pub fn validate(&self) -> Result<(), AppError> {
        self.daily.validate("daily")?;
        self.fast.validate("fast")?;
        self.manual.validate("manual")?;
        if self.fast.enabled && self.fast.interval_hours == 0 {
            return Err(AppError::configuration("scheduler.fast.interval_hours must be > 0"));
        }
        if self.expense_workers == 0 {
            return Err(AppError::configuration("scheduler.expense_workers must be > 0"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily: default_daily(),
            fast: default_fast(),
            manual: default_manual(),
            expense_workers: default_expense_workers(),
            cleanup_cron: default_cleanup_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_run_hour() -> u32 {
    9
}

fn default_interval_hours() -> u32 {
    4
}

fn default_daily() -> ScheduleConfig {
    ScheduleConfig {
        enabled: true,
        min_interval_hours: 20,
        run_hour_utc: default_run_hour(),
        interval_hours: 24,
        cron: Some("0 0 9 * * *".to_string()),
        lookback_days: 3,
        categories: CategoryToggles::all(),
    }
}

fn default_fast() -> ScheduleConfig {
    ScheduleConfig {
        enabled: true,
        min_interval_hours: 4,
        run_hour_utc: default_run_hour(),
        interval_hours: default_interval_hours(),
        cron: Some("0 30 */4 * * *".to_string()),
        lookback_days: 1,
        categories: CategoryToggles {
            legislators: false,
            bills: true,
            expenses: false,
            votes: true,
        },
    }
}

fn default_manual() -> ScheduleConfig {
    ScheduleConfig {
        enabled: false,
        min_interval_hours: 0,
        run_hour_utc: default_run_hour(),
        interval_hours: 0,
        cron: None,
        lookback_days: 7,
        categories: CategoryToggles::all(),
    }
}

fn default_expense_workers() -> usize {
    4
}

fn default_cleanup_cron() -> String {
    "0 0 4 * * 0".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_run_hour_out_of_range() {
        let mut cfg = SchedulerConfig::default();
        cfg.daily.run_hour_utc = 24;
        let err = cfg.validate().unwrap_err();
        assert!(err.message.contains("scheduler.daily.run_hour_utc"));
    }

    #[test]
    fn test_lookback_bounded() {
        let mut cfg = SchedulerConfig::default();
        cfg.manual.lookback_days = MAX_LOOKBACK_DAYS;
        assert!(cfg.validate().is_ok());
        cfg.manual.lookback_days = u32::MAX;
        let err = cfg.validate().unwrap_err();
        assert!(err.message.contains("scheduler.manual.lookback_days"));
    }

    #[test]
    fn test_fast_interval_and_workers() {
        let mut cfg = SchedulerConfig::default();
        cfg.fast.interval_hours = 0;
        assert!(cfg.validate().is_err());
        cfg.fast.enabled = false;
        assert!(cfg.validate().is_ok());
        cfg.expense_workers = 0;
        assert!(cfg.validate().is_err());
    }
}
