//! Date conversions between Arrow `Date32` values and `chrono`.

use chrono::NaiveDate;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Convert Arrow Date32 value (days since the Unix epoch) to `NaiveDate`
#[must_use]
pub fn date32_to_naive_date(days_since_epoch: i32) -> NaiveDate {
    epoch() + chrono::Duration::days(i64::from(days_since_epoch))
}

/// Convert a `NaiveDate` to an Arrow Date32 value
#[must_use]
pub fn naive_date_to_date32(date: NaiveDate) -> i32 {
    // Dates handled by the simulation are well within the i32 day range
    (date - epoch()).num_days() as i32
}
