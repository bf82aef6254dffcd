//! Date helpers for the Dominican Republic (UTC-4, no daylight saving).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

const LOCAL_OFFSET_HOURS: i64 = -4;

/// Wall-clock time in Santo Domingo.
#[must_use]
pub fn to_local(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.naive_utc() + TimeDelta::hours(LOCAL_OFFSET_HOURS)
}

/// Calendar date in Santo Domingo.
#[must_use]
pub fn local_today(instant: DateTime<Utc>) -> NaiveDate {
    to_local(instant).date()
}

/// `DD-MM-YYYY`.
#[must_use]
pub fn format_dmy(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// `DD-MM-YYYY HH:mm:ss`.
#[must_use]
pub fn format_dmy_hms(moment: NaiveDateTime) -> String {
    moment.format("%d-%m-%Y %H:%M:%S").to_string()
}

/// Parse a calendar date written as `DD-MM-YYYY`, `YYYY-MM-DD`, `DD/MM/YYYY`
/// or an ISO timestamp.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    for format in ["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.date_naive());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|moment| moment.date())
}

/// Parse `DD-MM-YYYY HH:mm:ss`.
#[must_use]
pub fn parse_dmy_hms(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), "%d-%m-%Y %H:%M:%S").ok()
}

/// Parse an instant sent by the certification service.
///
/// Offsets are honoured; timestamps without one are local time.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%d-%m-%Y %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|local| (local - TimeDelta::hours(LOCAL_OFFSET_HOURS)).and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_local_today_crosses_midnight() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();
        assert_eq!(
            local_today(instant),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2027, 3, 9).unwrap();
        assert_eq!(parse_date("09-03-2027"), Some(expected));
        assert_eq!(parse_date("2027-03-09"), Some(expected));
        assert_eq!(parse_date("09/03/2027"), Some(expected));
        assert_eq!(parse_date("2027-03-09T10:00:00"), Some(expected));
        assert_eq!(parse_date("March 9"), None);
    }

    #[test]
    fn test_parse_timestamp_treats_naive_as_local() {
        let parsed = parse_timestamp("2026-05-01T08:00:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap());

        let with_offset = parse_timestamp("2026-05-01T08:00:00Z").unwrap();
        assert_eq!(
            with_offset,
            Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_format_round_trip() {
        let moment = parse_dmy_hms("05-02-2026 14:30:00").unwrap();
        assert_eq!(format_dmy_hms(moment), "05-02-2026 14:30:00");
        assert_eq!(format_dmy(moment.date()), "05-02-2026");
    }
}
