//! Timestamp parsing and formatting for tabular files.
//!
//! Accepted inputs: millisecond epoch integers, RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`,
//! `YYYY-MM-DDTHH:MM:SS[.f]` and bare `YYYY-MM-DD` dates. Output is always
//! `YYYY-MM-DD HH:MM:SS.mmm`, which the parser accepts back.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

pub const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ms) = raw.parse::<i64>() {
        return from_epoch_millis(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(CSV_TIMESTAMP_FORMAT).to_string()
}

pub fn from_epoch_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

pub fn to_epoch_millis(ts: &NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn parses_every_supported_shape() {
        let expected = midnight(2024, 10, 17);
        assert_eq!(parse_timestamp("1729123200000"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-17T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-17 00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-17 00:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-17T00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-17"), Some(expected));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn format_is_parseable() {
        let ts = midnight(2024, 2, 29) + chrono::Duration::milliseconds(1_234);
        assert_eq!(format_timestamp(&ts), "2024-02-29 00:00:01.234");
        assert_eq!(parse_timestamp(&format_timestamp(&ts)), Some(ts));
        assert_eq!(from_epoch_millis(to_epoch_millis(&ts)), Some(ts));
    }
}
