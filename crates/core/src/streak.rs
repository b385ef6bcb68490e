//! Consecutive-day streak computation.

use chrono::{Days, NaiveDate};

use crate::model::ActivityRecord;

/// Count consecutive activity days ending at and including `today`.
///
/// Dates are walked newest first; each one must be exactly `today - streak`
/// days for the streak to continue. A record without `today` yields `0`, so
/// callers are expected to pass the record after appending today's
/// completion. Dates after `today` are ignored.
///
/// # Examples
///
/// ```
/// # use chrono::NaiveDate;
/// # use quiz_core::model::ActivityRecord;
/// # use quiz_core::streak::current_streak;
/// let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
/// let record = ActivityRecord::parse(["2024-03-05", "2024-03-04", "2024-03-01"]).unwrap();
/// assert_eq!(current_streak(&record, today), 2);
/// ```
#[must_use]
pub fn current_streak(record: &ActivityRecord, today: NaiveDate) -> u32 {
    let mut streak = 0_u32;
    for date in record.iter().rev().filter(|d| **d <= today) {
        let Some(expected) = today.checked_sub_days(Days::new(u64::from(streak))) else {
            break;
        };
        if *date != expected {
            break;
        }
        streak = streak.saturating_add(1);
    }
    streak
}
