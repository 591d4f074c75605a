//! Safe parsing and formatting for catalog timestamps.
//!
//! The catalog stores timestamps as ISO-8601 strings that may be missing,
//! empty, or malformed. Every consumer goes through [`parse_date`] and
//! branches on the `Option`, never on string truthiness.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Parse a catalog date string. Empty, absent, and unparseable input all
/// yield `None`.
pub fn parse_date(s: Option<&str>) -> Option<DateTime<Utc>> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive variants without a timezone suffix still show up in old records.
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Convert a parsed date to `SystemTime`, millisecond precision.
pub fn to_system_time(dt: DateTime<Utc>) -> SystemTime {
    let ms = dt.timestamp_millis();
    if ms <= 0 {
        UNIX_EPOCH
    } else {
        UNIX_EPOCH + Duration::from_millis(ms as u64)
    }
}

/// `SystemTime` from an optional record date, falling back to now.
pub fn system_time_or_now(dt: Option<DateTime<Utc>>) -> SystemTime {
    dt.map(to_system_time).unwrap_or_else(SystemTime::now)
}

/// Stat timestamps from a record's created/updated pair:
/// `(mtime, atime, ctime) = (created, updated, updated)`, so sorting by
/// mtime yields chronological channel order.
pub fn stat_times(
    created: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
) -> (SystemTime, SystemTime, SystemTime) {
    let mtime = system_time_or_now(created);
    let utime = system_time_or_now(updated);
    (mtime, utime, utime)
}

/// Local date-and-time rendering, `M/D/YYYY, h:MM:SS AM`.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

/// Local date rendering, `M/D/YYYY`.
pub fn format_date(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%-m/%-d/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_inputs_yield_none() {
        assert!(parse_date(None).is_none());
        assert!(parse_date(Some("")).is_none());
        assert!(parse_date(Some("   ")).is_none());
        assert!(parse_date(Some("not a date")).is_none());
    }

    #[test]
    fn canonical_iso_parses() {
        let dt = parse_date(Some("2023-06-15T10:30:00.000Z")).unwrap();
        assert_eq!(dt.timestamp(), 1686825000);
        assert_eq!(dt.timestamp_millis(), 1686825000000);
    }

    #[test]
    fn naive_and_date_only_forms_parse() {
        assert!(parse_date(Some("2023-06-15T10:30:00")).is_some());
        assert!(parse_date(Some("2023-06-15")).is_some());
        assert!(parse_date(Some("2021-01-02T03:04:05.678+02:00")).is_some());
    }

    #[test]
    fn system_time_matches_epoch_millis() {
        let dt = parse_date(Some("2023-06-15T10:30:00.500Z")).unwrap();
        let st = to_system_time(dt);
        let since = st.duration_since(UNIX_EPOCH).unwrap();
        assert_eq!(since.as_millis(), 1686825000500);
    }

    #[test]
    fn stat_times_use_created_for_mtime() {
        let created = parse_date(Some("2020-01-01T00:00:00Z"));
        let updated = parse_date(Some("2021-01-01T00:00:00Z"));
        let (mtime, atime, ctime) = stat_times(created, updated);
        assert_eq!(mtime, to_system_time(created.unwrap()));
        assert_eq!(atime, to_system_time(updated.unwrap()));
        assert_eq!(ctime, atime);
    }

    #[test]
    fn invalid_dates_fall_back_to_now() {
        let before = SystemTime::now();
        let (mtime, _, _) = stat_times(None, None);
        assert!(mtime >= before);
    }
}
