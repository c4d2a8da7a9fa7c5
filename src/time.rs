//! Temporal helpers: instant parsing and closed time ranges.
//!
//! Survey data is stamped in UTC with a mix of RFC 3339 and
//! `YYYY-MM-DD HH:MM:SS` spellings. Ranges here are closed on both ends,
//! matching how the comparison window and report filters select records.

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses a timestamp from a dataset cell.
///
/// Accepts RFC 3339 (with offset) or a naive date-time interpreted as UTC.
/// Returns `None` for anything else, including empty cells.
///
/// # Examples
///
/// ```
/// use quakeview::time::parse_instant;
///
/// let a = parse_instant("2020-04-08T08:00:00Z").unwrap();
/// let b = parse_instant("2020-04-08 08:00:00").unwrap();
/// assert_eq!(a, b);
/// assert!(parse_instant("yesterday").is_none());
/// ```
#[must_use]
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Truncates an instant to the start of its hour.
#[must_use]
pub fn truncate_to_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// A closed time range `[from, to]`; either end may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the range (inclusive). `None` means unbounded.
    pub from: Option<DateTime<Utc>>,

    /// End of the range (inclusive). `None` means unbounded.
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Creates a bounded range. Swapped ends are reordered.
    #[must_use]
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from.min(to)),
            to: Some(from.max(to)),
        }
    }

    /// The unbounded range.
    #[must_use]
    pub const fn all() -> Self {
        Self { from: None, to: None }
    }

    /// Everything at or before `to`.
    #[must_use]
    pub const fn until(to: DateTime<Utc>) -> Self {
        Self { from: None, to: Some(to) }
    }

    /// Everything at or after `from`.
    #[must_use]
    pub const fn starting_at(from: DateTime<Utc>) -> Self {
        Self { from: Some(from), to: None }
    }

    /// The symmetric window `[center - radius, center + radius]`.
    ///
    /// An end that falls outside the representable calendar is left unbounded.
    #[must_use]
    pub fn around(center: DateTime<Utc>, radius: Duration) -> Self {
        let radius = radius.abs();
        Self {
            from: center.checked_sub_signed(radius),
            to: center.checked_add_signed(radius),
        }
    }

    /// True when neither end is bounded.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Check if a timestamp falls within this range.
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| time >= from) && self.to.map_or(true, |to| time <= to)
    }

    /// Length of the range, if both ends are bounded.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => Some(to - from),
            _ => None,
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.from, self.to) {
            (Some(from), Some(to)) => write!(f, "[{from} → {to}]"),
            (Some(from), None) => write!(f, "[{from} → ∞)"),
            (None, Some(to)) => write!(f, "(-∞ → {to}]"),
            (None, None) => write!(f, "(-∞ → ∞)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 4, 8, h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_instant_formats() {
        let expected = at(8, 35);
        assert_eq!(parse_instant("2020-04-08T08:35:00Z"), Some(expected));
        assert_eq!(parse_instant("2020-04-08T10:35:00+02:00"), Some(expected));
        assert_eq!(parse_instant("2020-04-08 08:35:00"), Some(expected));
        assert_eq!(parse_instant("2020-04-08 08:35"), Some(expected));
        assert_eq!(parse_instant("  2020-04-08T08:35:00  "), Some(expected));
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        assert!(parse_instant("").is_none());
        assert!(parse_instant("NA").is_none());
        assert!(parse_instant("2020-13-40 99:00:00").is_none());
    }

    #[test]
    fn test_truncate_to_hour() {
        let t = Utc.with_ymd_and_hms(2020, 4, 8, 8, 59, 59).unwrap();
        assert_eq!(truncate_to_hour(t), at(8, 0));
    }

    #[test]
    fn test_time_range_new_reorders() {
        let range = TimeRange::new(at(12, 0), at(10, 0));
        assert_eq!(range.from, Some(at(10, 0)));
        assert_eq!(range.to, Some(at(12, 0)));
        assert_eq!(range.duration(), Some(Duration::hours(2)));
    }

    #[test]
    fn test_time_range_contains_is_closed() {
        let range = TimeRange::new(at(10, 0), at(12, 0));
        assert!(range.contains(at(10, 0)));
        assert!(range.contains(at(11, 0)));
        assert!(range.contains(at(12, 0)));
        assert!(!range.contains(at(12, 1)));
        assert!(!range.contains(at(9, 59)));
    }

    #[test]
    fn test_time_range_open_ends() {
        assert!(TimeRange::all().contains(at(0, 0)));
        assert!(TimeRange::all().is_unbounded());
        assert!(TimeRange::until(at(10, 0)).contains(at(1, 0)));
        assert!(!TimeRange::until(at(10, 0)).contains(at(10, 1)));
        assert!(TimeRange::starting_at(at(10, 0)).contains(at(23, 0)));
        assert!(TimeRange::starting_at(at(10, 0)).duration().is_none());
    }

    #[test]
    fn test_time_range_around() {
        let range = TimeRange::around(at(12, 0), Duration::hours(6));
        assert!(range.contains(at(6, 0)));
        assert!(range.contains(at(18, 0)));
        assert!(!range.contains(at(18, 1)));
    }

    #[test]
    fn test_time_range_around_saturates_to_open_ends() {
        let range = TimeRange::around(at(12, 0), Duration::days(1_000_000 * 365));
        assert!(range.is_unbounded());
        assert!(range.contains(at(0, 0)));
    }

    #[test]
    fn test_time_range_display() {
        let display = format!("{}", TimeRange::starting_at(at(10, 0)));
        assert!(display.contains('∞'));
    }

    #[test]
    fn test_time_range_serialization() {
        let range = TimeRange::new(at(10, 0), at(12, 0));
        let json = serde_json::to_string(&range).unwrap();
        let back: TimeRange = serde_json::from_str(&json).unwrap();
        assert_eq!(range, back);
    }
}
