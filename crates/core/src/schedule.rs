//! Daily sweep schedule and next-run computation.
//!
//! The next run is always "the next occurrence of hour:minute on the local
//! wall clock, strictly after now". It is recomputed after every firing, so
//! daylight-saving shifts never accumulate into drift.

use chrono::{DateTime, Days, LocalResult, NaiveDateTime, TimeDelta, TimeZone};
use serde::Serialize;

use crate::error::SweepError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Hour of the daily run when none is configured.
pub const DEFAULT_SCHEDULE_HOUR: u32 = 3;

/// Minute of the daily run when none is configured.
pub const DEFAULT_SCHEDULE_MINUTE: u32 = 0;

/// Longest local-time gap searched when the requested time does not exist.
const MAX_GAP_MINUTES: i64 = 3 * 60;

// ---------------------------------------------------------------------------
// SweepSchedule
// ---------------------------------------------------------------------------

/// When the sweeper runs: once per calendar day at `hour:minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepSchedule {
    enabled: bool,
    hour: u32,
    minute: u32,
}

impl SweepSchedule {
    /// Build a validated schedule.
    ///
    /// `hour` must be 0–23 and `minute` 0–59.
    pub fn new(enabled: bool, hour: u32, minute: u32) -> Result<Self, SweepError> {
        if hour > 23 {
            return Err(SweepError::Configuration(format!(
                "Schedule hour must be 0-23, got {hour}"
            )));
        }
        if minute > 59 {
            return Err(SweepError::Configuration(format!(
                "Schedule minute must be 0-59, got {minute}"
            )));
        }
        Ok(Self {
            enabled,
            hour,
            minute,
        })
    }

    /// Daily schedule at `hour:minute`, enabled.
    pub fn daily_at(hour: u32, minute: u32) -> Result<Self, SweepError> {
        Self::new(true, hour, minute)
    }

    /// A schedule that never fires.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            hour: DEFAULT_SCHEDULE_HOUR,
            minute: DEFAULT_SCHEDULE_MINUTE,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Next occurrence of `hour:minute` in `now`'s time zone, strictly after
    /// `now`.
    ///
    /// Ambiguous local times (clocks set back) resolve to the earlier
    /// instant. Local times that do not exist (clocks set forward) resolve to
    /// the first existing minute after them. Returns `None` only when the
    /// calendar overflows.
    pub fn next_run_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let zone = now.timezone();
        let today = now.date_naive();

        // Two days ahead covers "today already passed" plus a skipped
        // occurrence on a transition day.
        (0..=2).find_map(|offset| {
            let date = today.checked_add_days(Days::new(offset))?;
            let wall = date.and_hms_opt(self.hour, self.minute, 0)?;
            resolve_local(&zone, wall).filter(|candidate| candidate > now)
        })
    }
}

impl std::fmt::Display for SweepSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.enabled {
            write!(f, "daily at {:02}:{:02}", self.hour, self.minute)
        } else {
            write!(f, "disabled")
        }
    }
}

/// Map a local wall-clock time onto a concrete instant.
fn resolve_local<Tz: TimeZone>(zone: &Tz, wall: NaiveDateTime) -> Option<DateTime<Tz>> {
    match zone.from_local_datetime(&wall) {
        LocalResult::Single(at) => Some(at),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => (1..=MAX_GAP_MINUTES).find_map(|minutes| {
            zone.from_local_datetime(&(wall + TimeDelta::minutes(minutes)))
                .earliest()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{FixedOffset, NaiveTime, Timelike};

    fn utc_plus_one() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn accepts_bounds() {
        assert!(SweepSchedule::daily_at(0, 0).is_ok());
        assert!(SweepSchedule::daily_at(23, 59).is_ok());
    }

    #[test]
    fn rejects_hour_out_of_range() {
        assert_matches!(
            SweepSchedule::daily_at(24, 0),
            Err(SweepError::Configuration(msg)) if msg.contains("hour")
        );
    }

    #[test]
    fn rejects_minute_out_of_range() {
        assert_matches!(
            SweepSchedule::daily_at(3, 60),
            Err(SweepError::Configuration(msg)) if msg.contains("minute")
        );
    }

    #[test]
    fn display_formats_time() {
        assert_eq!(SweepSchedule::daily_at(3, 5).unwrap().to_string(), "daily at 03:05");
        assert_eq!(SweepSchedule::disabled().to_string(), "disabled");
    }

    // -----------------------------------------------------------------------
    // Next run
    // -----------------------------------------------------------------------

    #[test]
    fn next_run_later_today() {
        let schedule = SweepSchedule::daily_at(3, 0).unwrap();
        let now = utc_plus_one().with_ymd_and_hms(2024, 6, 10, 1, 15, 0).unwrap();

        let next = schedule.next_run_after(&now).unwrap();
        assert_eq!(next, utc_plus_one().with_ymd_and_hms(2024, 6, 10, 3, 0, 0).unwrap());
    }

    #[test]
    fn next_run_tomorrow_once_passed() {
        let schedule = SweepSchedule::daily_at(3, 0).unwrap();
        let now = utc_plus_one().with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();

        let next = schedule.next_run_after(&now).unwrap();
        assert_eq!(next, utc_plus_one().with_ymd_and_hms(2024, 6, 11, 3, 0, 0).unwrap());
    }

    #[test]
    fn next_run_is_strictly_after_now() {
        let schedule = SweepSchedule::daily_at(3, 0).unwrap();
        let now = utc_plus_one().with_ymd_and_hms(2024, 6, 10, 3, 0, 0).unwrap();

        let next = schedule.next_run_after(&now).unwrap();
        assert_eq!(next - now, TimeDelta::days(1));
    }

    #[test]
    fn next_run_crosses_month_end() {
        let schedule = SweepSchedule::daily_at(23, 30).unwrap();
        let now = utc_plus_one().with_ymd_and_hms(2024, 2, 29, 23, 45, 0).unwrap();

        let next = schedule.next_run_after(&now).unwrap();
        assert_eq!(next.date_naive().to_string(), "2024-03-01");
        assert_eq!(next.time(), NaiveTime::from_hms_opt(23, 30, 0).unwrap());
    }

    #[test]
    fn next_run_keeps_wall_clock_minute() {
        let schedule = SweepSchedule::daily_at(17, 42).unwrap();
        let now = utc_plus_one().with_ymd_and_hms(2024, 6, 10, 0, 0, 1).unwrap();

        let next = schedule.next_run_after(&now).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (17, 42, 0));
    }
}
