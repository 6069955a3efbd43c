//! Run cadence arithmetic.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use legisync_core::config::{ScheduleConfig, SchedulerConfig};
use legisync_entity::execution::SchedulerType;

/// Configuration of one scheduler type.
pub fn schedule_for(config: &SchedulerConfig, scheduler_type: SchedulerType) -> &ScheduleConfig {
    match scheduler_type {
        SchedulerType::Daily => &config.daily,
        SchedulerType::Fast => &config.fast,
        SchedulerType::Manual => &config.manual,
    }
}

/// Next eligible run after a successful run finishing at `now`.
///
/// Daily runs move to tomorrow at `run_hour_utc`, fast runs to
/// `now + interval_hours`; manual runs have no cadence.
pub fn next_execution(
    scheduler_type: SchedulerType,
    schedule: &ScheduleConfig,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match scheduler_type {
        SchedulerType::Daily => {
            let tomorrow = now.date_naive().succ_opt()?;
            tomorrow
                .and_hms_opt(schedule.run_hour_utc.min(23), 0, 0)
                .map(|dt| dt.and_utc())
        }
        SchedulerType::Fast => Some(now + Duration::hours(i64::from(schedule.interval_hours.max(1)))),
        SchedulerType::Manual => None,
    }
}

/// Dates covered by an incremental run: the last `lookback_days` days up
/// to and including today.
pub fn lookback_window(today: NaiveDate, lookback_days: u32) -> (NaiveDate, NaiveDate) {
    let since = today - Duration::days(i64::from(lookback_days));
    (since, today)
}

/// Every `(year, month)` touched by a date window, in order.
pub fn months_in_window(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    while (year, month) <= (end.year(), end.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule() -> ScheduleConfig {
        SchedulerConfig::default().daily
    }

    #[test]
    fn test_daily_moves_to_tomorrow_at_run_hour() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 22, 15, 0).unwrap();
        let next = next_execution(SchedulerType::Daily, &schedule(), now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_fast_adds_interval() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let fast = SchedulerConfig::default().fast;
        let next = next_execution(SchedulerType::Fast, &fast, now).unwrap();
        assert_eq!(next, now + Duration::hours(4));
    }

    #[test]
    fn test_manual_has_no_next_run() {
        assert!(next_execution(SchedulerType::Manual, &schedule(), Utc::now()).is_none());
    }

    #[test]
    fn test_months_across_year_boundary() {
        let start = NaiveDate::from_ymd_opt(2023, 12, 29).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(months_in_window(start, end), vec![(2023, 12), (2024, 1)]);
    }

    #[test]
    fn test_lookback_window() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let (since, until) = lookback_window(today, 3);
        assert_eq!(since, NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
        assert_eq!(until, today);
    }
}
