//! Human-readable transfer codes: `TRF-YYYYMMDD-NNNN`, numbered per
//! organization and day.

use chrono::NaiveDate;

pub const MAX_CODE_ATTEMPTS: usize = 20;

pub fn day_prefix(date: NaiveDate) -> String {
    format!("TRF-{}-", date.format("%Y%m%d"))
}

pub fn format_code(date: NaiveDate, sequence: u32) -> String {
    format!("{}{:04}", day_prefix(date), sequence)
}

/// Sequence number of a code issued on `date`, if it is one.
pub fn sequence_of(code: &str, date: NaiveDate) -> Option<u32> {
    code.strip_prefix(&day_prefix(date))?.parse().ok()
}

/// Candidates in the order they are tried: one past the highest sequence
/// already issued that day, then upwards.
pub fn candidates<'a, I>(date: NaiveDate, existing: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = &'a str>,
{
    let highest = existing
        .into_iter()
        .filter_map(|code| sequence_of(code, date))
        .max()
        .unwrap_or(0);
    (highest + 1..).map(move |sequence| format_code(date, sequence))
}
