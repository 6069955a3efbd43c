//! Typed run configuration persisted with each execution.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use legisync_core::config::CategoryToggles;
use legisync_core::error::AppError;
use legisync_core::result::AppResult;

use super::kind::SchedulerType;

/// Parameters of a historical backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillRequest {
    /// First year covered.
    pub start_year: i32,
    /// Last year covered (inclusive).
    pub end_year: i32,
    /// Run even if a successful run already covers the range.
    #[serde(default)]
    pub force: bool,
    /// Categories backfilled.
    #[serde(default)]
    pub categories: CategoryToggles,
    /// Who asked for the run (`"cli"`, `"cron"`, `"api"`, ...).
    pub triggered_by: String,
}

impl BackfillRequest {
    /// A request for every category over a year range.
    pub fn new(start_year: i32, end_year: i32, triggered_by: impl Into<String>) -> Self {
        Self {
            start_year,
            end_year,
            force: false,
            categories: CategoryToggles::all(),
            triggered_by: triggered_by.into(),
        }
    }

    /// Mark the request as forced.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Years covered.
    pub fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    /// Whether this range contains `start..=end`.
    pub fn covers(&self, start_year: i32, end_year: i32) -> bool {
        self.start_year <= start_year && self.end_year >= end_year
    }

    /// Reject malformed ranges before any work starts.
    pub fn validate(&self, min_year: i32, max_year: i32) -> AppResult<()> {
        if self.start_year > self.end_year {
            return Err(AppError::validation(format!(
                "start_year {} is after end_year {}",
                self.start_year, self.end_year
            )));
        }
        if self.start_year < min_year {
            return Err(AppError::validation(format!(
                "start_year {} is before the earliest supported year {min_year}",
                self.start_year
            )));
        }
        if self.end_year > max_year {
            return Err(AppError::validation(format!(
                "end_year {} is in the future",
                self.end_year
            )));
        }
        if !self.categories.any() {
            return Err(AppError::validation("at least one category must be enabled"));
        }
        Ok(())
    }
}

/// Parameters of a scheduler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerRequest {
    /// Cadence being run.
    pub scheduler_type: SchedulerType,
    /// Skip the minimum-interval check.
    #[serde(default)]
    pub force: bool,
    /// Override the configured categories.
    #[serde(default)]
    pub categories: Option<CategoryToggles>,
    /// Who asked for the run.
    pub triggered_by: String,
}

impl SchedulerRequest {
    /// A request using the configured categories.
    pub fn new(scheduler_type: SchedulerType, triggered_by: impl Into<String>) -> Self {
        Self {
            scheduler_type,
            force: false,
            categories: None,
            triggered_by: triggered_by.into(),
        }
    }
}

/// Run configuration, serialized into the execution row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionConfig {
    /// Historical backfill parameters.
    Backfill(BackfillRequest),
    /// Scheduler run parameters.
    Scheduler(SchedulerRequest),
}

impl ExecutionConfig {
    /// Backfill parameters, if this is a backfill.
    pub fn as_backfill(&self) -> Option<&BackfillRequest> {
        match self {
            Self::Backfill(req) => Some(req),
            Self::Scheduler(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_inverted_range() {
        let req = BackfillRequest::new(2024, 2022, "test");
        assert!(req.validate(2000, 2026).is_err());
    }

    #[test]
    fn test_validate_rejects_future_year() {
        let req = BackfillRequest::new(2022, 2030, "test");
        assert!(req.validate(2000, 2026).is_err());
    }

    #[test]
    fn test_covers() {
        let req = BackfillRequest::new(2020, 2024, "test");
        assert!(req.covers(2022, 2024));
        assert!(!req.covers(2019, 2024));
    }

    #[test]
    fn test_config_serializes_with_type_tag() {
        let config = ExecutionConfig::Backfill(BackfillRequest::new(2022, 2024, "cli"));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "backfill");
        assert_eq!(json["start_year"], 2022);
        let back: ExecutionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
