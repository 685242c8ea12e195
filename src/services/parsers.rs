//! Lenient field parsers
//!
//! Every parser maps raw CSV text to `Some(value)` or `None` and never fails.
//! `None` means "not provided or unusable", which is kept distinct from a
//! parsed `false` or `0`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::types::Location;

const TRUTHY: &[&str] = &["1", "true", "t", "yes", "y", "si", "sí"];
const FALSY: &[&str] = &["0", "false", "f", "no", "n"];

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_bool(value: Option<&str>) -> Option<bool> {
    let v = non_empty(value)?.to_lowercase();
    if TRUTHY.contains(&v.as_str()) {
        Some(true)
    } else if FALSY.contains(&v.as_str()) {
        Some(false)
    } else {
        None
    }
}

pub fn parse_int(value: Option<&str>) -> Option<i64> {
    non_empty(value)?.parse().ok()
}

/// Finite floats only; `NaN` and infinities are treated as absent.
pub fn parse_float(value: Option<&str>) -> Option<f64> {
    non_empty(value)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse an ISO-8601 timestamp such as `2024-11-13T22:10:00.123Z`.
///
/// A trailing `Z` is dropped and the `T` separator becomes a space. Values
/// with an explicit offset are normalized to UTC; a bare date means midnight.
pub fn parse_timestamp(value: Option<&str>) -> Option<NaiveDateTime> {
    let raw = non_empty(value)?;
    let raw = raw.strip_suffix('Z').unwrap_or(raw);
    let v = raw.replacen('T', " ", 1);

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&v, format) {
            return Some(ts);
        }
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(ts) = DateTime::parse_from_str(&v, format) {
            return Some(ts.naive_utc());
        }
    }

    NaiveDate::parse_from_str(&v, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a `"lat,lon"` tag. Both components must be numeric.
pub fn parse_location(value: Option<&str>) -> Option<Location> {
    let raw = non_empty(value)?;
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return None;
    }

    let lat = parse_float(Some(parts[0]))?;
    let lon = parse_float(Some(parts[1]))?;
    Some(Location { lat, lon })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_bool_truthy_and_falsy_tokens() {
        for token in ["1", "true", "T", "Yes", "y", "si", "SÍ", " TRUE "] {
            assert_eq!(parse_bool(Some(token)), Some(true), "token {:?}", token);
        }
        for token in ["0", "false", "F", "NO", "n"] {
            assert_eq!(parse_bool(Some(token)), Some(false), "token {:?}", token);
        }
    }

    #[test]
    fn test_parse_bool_unknown_is_absent_not_false() {
        assert_eq!(parse_bool(Some("")), None);
        assert_eq!(parse_bool(Some("maybe")), None);
        assert_eq!(parse_bool(Some("2")), None);
        assert_eq!(parse_bool(None), None);
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(Some("42")), Some(42));
        assert_eq!(parse_int(Some(" -7 ")), Some(-7));
        assert_eq!(parse_int(Some("")), None);
        assert_eq!(parse_int(Some("abc")), None);
        assert_eq!(parse_int(Some("3.5")), None);
    }

    #[test]
    fn test_parse_int_keeps_full_frame_counter_range() {
        assert_eq!(parse_int(Some("3000000000")), Some(3_000_000_000));
        assert_eq!(parse_int(Some("4294967295")), Some(u32::MAX as i64));
        assert_eq!(parse_int(Some("99999999999999999999")), None);
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float(Some("3.25")), Some(3.25));
        assert_eq!(parse_float(Some("10")), Some(10.0));
        assert_eq!(parse_float(Some("")), None);
        assert_eq!(parse_float(Some("n/a")), None);
        assert_eq!(parse_float(Some("NaN")), None);
        assert_eq!(parse_float(Some("inf")), None);
    }

    #[test]
    fn test_parse_timestamp_iso_with_z() {
        let ts = parse_timestamp(Some("2024-11-13T22:10:00.123Z")).unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 11, 13).unwrap());
        assert_eq!(ts.hour(), 22);
        assert_eq!(ts.minute(), 10);
        assert_eq!(ts.nanosecond(), 123_000_000);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp(Some("2024-11-13T22:10:00")).is_some());
        assert!(parse_timestamp(Some("2024-11-13 22:10:00")).is_some());
        assert!(parse_timestamp(Some("2024-11-13T22:10")).is_some());

        let midnight = parse_timestamp(Some("2024-11-13")).unwrap();
        assert_eq!(midnight.hour(), 0);

        let shifted = parse_timestamp(Some("2024-11-13T22:10:00+02:00")).unwrap();
        assert_eq!(shifted.hour(), 20);
    }

    #[test]
    fn test_parse_timestamp_failures_are_absent() {
        assert_eq!(parse_timestamp(Some("")), None);
        assert_eq!(parse_timestamp(Some("not-a-date")), None);
        assert_eq!(parse_timestamp(Some("2024-13-45T99:00:00Z")), None);
        assert_eq!(parse_timestamp(None), None);
    }

    #[test]
    fn test_parse_location_pair() {
        let loc = parse_location(Some("-17.3935, -66.1570")).unwrap();
        assert_eq!(loc.lat, -17.3935);
        assert_eq!(loc.lon, -66.157);
    }

    #[test]
    fn test_parse_location_rejects_partial_values() {
        assert_eq!(parse_location(Some("-17.39")), None);
        assert_eq!(parse_location(Some("-17.39,abc")), None);
        assert_eq!(parse_location(Some("1,2,3")), None);
        assert_eq!(parse_location(Some(",")), None);
        assert_eq!(parse_location(Some("")), None);
    }
}
