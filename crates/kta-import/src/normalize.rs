//! Field normalization for raw CSV values
//!
//! Every function here is total: unrecognized input degrades to `None`
//! instead of producing an error.

use crate::models::Gender;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Datetime layouts seen in member exports, tried in order after RFC 3339
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

/// Date-only layouts, interpreted as midnight UTC
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Trim a raw value, mapping empty strings to `None`
pub fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Map a free-text gender value to `L`/`P`
///
/// Only the first letter matters, case-insensitively: "Laki-laki", "L",
/// "laki" give [`Gender::L`]; "Perempuan", "p" give [`Gender::P`].
pub fn normalize_gender(raw: Option<&str>) -> Option<Gender> {
    let first = raw?.trim().chars().next()?;

    match first.to_ascii_lowercase() {
        'l' => Some(Gender::L),
        'p' => Some(Gender::P),
        _ => None,
    }
}

/// Leniently parse a date or datetime
///
/// Accepts RFC 3339, ISO-like naive datetimes, and the day-first layouts
/// (`15-01-2023`, `15/01/2023 08:30`) that spreadsheet exports produce.
/// Naive values are taken as UTC.
pub fn parse_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

/// Like [`parse_date`], keeping only the calendar date
///
/// An offset timestamp keeps the date it names in its own offset.
pub fn parse_naive_date(raw: Option<&str>) -> Option<NaiveDate> {
    let s = raw?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    parse_date(Some(s)).map(|dt| dt.date_naive())
}
