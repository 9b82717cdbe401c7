//! Day keys for the daily call quota.

use chrono::{DateTime, NaiveDate, Utc};

/// Calendar day (UTC) a quota counter belongs to.
pub fn quota_day(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Storage key for a quota day in "YYYY-MM-DD" format.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use vdigest_models::day_key;
///
/// let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
/// assert_eq!(day_key(day), "2025-03-07");
/// ```
pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
