//! Shared field parsing for the city CSV layouts.
//!
//! Timestamps come in two shapes: ISO-8601 with an explicit offset, or a
//! local date-time that must be placed in the city's time zone. Counts are
//! integers (or decimals for Paris), where an empty field means zero.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone as _, Utc};
use chrono_tz::Tz;

/// Parses an ISO-8601 date-time with an offset (`2023-08-11T10:00:00+02:00`,
/// `2023-08-11T08:00:00Z`). Fractional seconds are accepted, seconds may be
/// omitted, and a trailing `[Region/Zone]` suffix is ignored.
#[must_use]
pub fn parse_offset_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.split_once('[').map_or(value, |(timestamp, _)| timestamp);

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    if let Ok(timestamp) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z") {
        return Some(timestamp.with_timezone(&Utc));
    }
    None
}

/// Parses a local ISO-8601 date-time with optional fractional seconds, as
/// found in Socrata exports.
#[must_use]
pub fn parse_local_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        return Some(naive);
    }
    None
}

/// Parses a `YYYY-MM-DD` date.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// The start of `hour` on `date`, or `None` if `hour` is not 0..=23.
#[must_use]
pub fn at_hour(date: NaiveDate, hour: u32) -> Option<NaiveDateTime> {
    NaiveTime::from_hms_opt(hour, 0, 0).map(|time| date.and_time(time))
}

/// Places a local date-time in `zone`.
///
/// A time repeated by a DST fall-back resolves to the earlier instant. A
/// time skipped by a DST spring-forward is moved one hour later.
#[must_use]
pub fn resolve_local_time(local: NaiveDateTime, zone: Tz) -> Option<DateTime<Utc>> {
    let resolved = zone.from_local_datetime(&local).earliest().or_else(|| {
        let shifted = local.checked_add_signed(TimeDelta::hours(1))?;
        zone.from_local_datetime(&shifted).earliest()
    })?;

    Some(resolved.with_timezone(&Utc))
}

/// Parses an integer count. An empty value is a count of zero.
#[must_use]
pub fn parse_hourly_count(value: &str) -> Option<i32> {
    if value.is_empty() {
        return Some(0);
    }
    value.parse().ok()
}

/// Parses a decimal count and truncates it toward zero. An empty value is a
/// count of zero; non-finite or out-of-range values are rejected.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_decimal_hourly_count(value: &str) -> Option<i32> {
    if value.is_empty() {
        return Some(0);
    }
    let count = value.parse::<f64>().ok()?.trunc();
    if !count.is_finite() || count < f64::from(i32::MIN) || count > f64::from(i32::MAX) {
        return None;
    }
    Some(count as i32)
}

#[cfg(test)]
mod tests {
    use chrono_tz::Europe;

    use super::*;

    fn utc(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn parses_offset_timestamps() {
        assert_eq!(
            parse_offset_timestamp("2023-08-11T10:00:00+02:00"),
            Some(utc("2023-08-11T08:00:00Z"))
        );
        assert_eq!(
            parse_offset_timestamp("2023-02-18T07:00:00.000+01:00"),
            Some(utc("2023-02-18T06:00:00Z"))
        );
        assert_eq!(
            parse_offset_timestamp("2023-08-11T10:00+02:00"),
            Some(utc("2023-08-11T08:00:00Z"))
        );
        assert_eq!(
            parse_offset_timestamp("2023-08-11T10:00:00+02:00[Europe/Paris]"),
            Some(utc("2023-08-11T08:00:00Z"))
        );
    }

    #[test]
    fn rejects_timestamps_without_offset() {
        assert_eq!(parse_offset_timestamp("2023-08-11T10:00:00"), None);
        assert_eq!(parse_offset_timestamp("not-a-date"), None);
    }

    #[test]
    fn parses_local_timestamps_with_and_without_fraction() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();

        assert_eq!(parse_local_timestamp("2024-01-15T14:30:00.000"), Some(expected));
        assert_eq!(parse_local_timestamp("2024-01-15T14:30:00"), Some(expected));
        assert_eq!(parse_local_timestamp("2024-01-15T14:30"), Some(expected));
        assert_eq!(parse_local_timestamp("15/01/2024 14:30"), None);
    }

    #[test]
    fn resolves_local_time_in_zone() {
        let local = parse_local_timestamp("2023-08-11T10:00:00").unwrap();

        assert_eq!(
            resolve_local_time(local, Europe::Paris),
            Some(utc("2023-08-11T08:00:00Z"))
        );
        assert_eq!(
            resolve_local_time(local, Europe::London),
            Some(utc("2023-08-11T09:00:00Z"))
        );
    }

    #[test]
    fn resolves_dst_overlap_to_earlier_instant() {
        let local = parse_local_timestamp("2023-10-29T02:30:00").unwrap();

        assert_eq!(
            resolve_local_time(local, Europe::Paris),
            Some(utc("2023-10-29T00:30:00Z"))
        );
    }

    #[test]
    fn shifts_dst_gap_forward() {
        let local = parse_local_timestamp("2023-03-26T02:00:00").unwrap();

        assert_eq!(
            resolve_local_time(local, Europe::Paris),
            Some(utc("2023-03-26T01:00:00Z"))
        );
    }

    #[test]
    fn builds_hour_of_day() {
        let date = parse_date("2023-08-11").unwrap();

        assert_eq!(
            at_hour(date, 7),
            parse_local_timestamp("2023-08-11T07:00:00")
        );
        assert_eq!(at_hour(date, 24), None);
        assert_eq!(parse_date("11/08/2023"), None);
    }

    #[test]
    fn parses_counts() {
        assert_eq!(parse_hourly_count(""), Some(0));
        assert_eq!(parse_hourly_count("42"), Some(42));
        assert_eq!(parse_hourly_count("-3"), Some(-3));
        assert_eq!(parse_hourly_count("4.5"), None);
        assert_eq!(parse_hourly_count("abc"), None);
    }

    #[test]
    fn truncates_decimal_counts() {
        assert_eq!(parse_decimal_hourly_count(""), Some(0));
        assert_eq!(parse_decimal_hourly_count("12.0"), Some(12));
        assert_eq!(parse_decimal_hourly_count("7.9"), Some(7));
        assert_eq!(parse_decimal_hourly_count("-1.5"), Some(-1));
        assert_eq!(parse_decimal_hourly_count("NaN"), None);
        assert_eq!(parse_decimal_hourly_count("douze"), None);
        assert_eq!(parse_decimal_hourly_count("3e12"), None);
    }
}
