//! Lenient timestamp parsing for feed records.
//!
//! Feeds send timestamps as strings in whatever shape their database
//! produced. Anything we can't read comes back as `None`; callers treat that
//! as "unknown time", never as an error.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Offset-less layouts, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a feed timestamp.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parse an optional timestamp field.
pub fn parse_opt(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(parse_timestamp)
}

/// Seconds from `from` to `to`, fractional.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_with_offset() {
        let dt = parse_timestamp("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn parses_naive_space_separated() {
        let dt = parse_timestamp("2024-03-01 10:00:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn parses_naive_fractional() {
        let dt = parse_timestamp("2024-03-01T10:00:00.250").unwrap();
        assert_eq!(dt.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
        assert!(parse_opt(None).is_none());
    }

    #[test]
    fn seconds_between_is_signed() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 30).unwrap();
        assert_eq!(seconds_between(a, b), 30.0);
        assert_eq!(seconds_between(b, a), -30.0);
    }
}
