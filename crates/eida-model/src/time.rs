//! FDSNWS time encoding: ISO-8601 without a timezone suffix, microsecond
//! precision, with bare `YYYY-MM-DD` treated as midnight UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::ModelError;

pub type Instant = DateTime<Utc>;

/// Sentinel used in place of an open-ended ("currently acquiring") epoch
/// boundary wherever the algorithms below need a concrete upper bound to
/// compare against (mirrors the original's `none_as_max` convention).
pub fn open_end() -> Instant {
    DateTime::<Utc>::MAX_UTC
}

pub fn is_open_end(instant: Instant) -> bool {
    instant == open_end()
}

/// Parse an FDSNWS-style timestamp: `YYYY-MM-DDTHH:MM:SS[.ffffff]` or a bare
/// `YYYY-MM-DD` date (midnight UTC). No timezone suffix is accepted or
/// expected -- all federator timestamps are implicitly UTC.
pub fn parse_fdsn_datetime(raw: &str) -> Result<Instant, ModelError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ModelError::InvalidTimestamp(raw.to_owned()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let ndt = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ModelError::InvalidTimestamp(raw.to_owned()))?;
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
        }
    }

    Err(ModelError::InvalidTimestamp(raw.to_owned()))
}

/// Format an instant the way the federator and routing surfaces emit it:
/// microsecond precision, no timezone suffix.
pub fn format_fdsn_datetime(instant: Instant) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Format an optional endtime, rendering an open end as the empty string
/// (used on the routing wire format, where an absent endtime means
/// "currently acquiring").
pub fn format_fdsn_datetime_opt(instant: Option<Instant>) -> String {
    match instant {
        Some(i) if !is_open_end(i) => format_fdsn_datetime(i),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_only_as_midnight_utc() {
        let t = parse_fdsn_datetime("2019-01-01").unwrap();
        assert_eq!(format_fdsn_datetime(t), "2019-01-01T00:00:00.000000");
    }

    #[test]
    fn parses_microsecond_precision() {
        let t = parse_fdsn_datetime("2019-01-01T12:30:45.123456").unwrap();
        assert_eq!(format_fdsn_datetime(t), "2019-01-01T12:30:45.123456");
    }

    #[test]
    fn parses_without_fractional_seconds() {
        let t = parse_fdsn_datetime("2019-01-01T12:30:45").unwrap();
        assert_eq!(format_fdsn_datetime(t), "2019-01-01T12:30:45.000000");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_fdsn_datetime("not-a-date").is_err());
    }

    #[test]
    fn open_end_formats_as_empty_string() {
        assert_eq!(format_fdsn_datetime_opt(None), "");
        assert_eq!(format_fdsn_datetime_opt(Some(open_end())), "");
    }
}
