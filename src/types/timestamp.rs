//! Date parsing and relative date anchors

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse an absolute date or date-time string (interpreted as UTC)
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Resolve a date literal relative to `now`.
///
/// Accepts `now-<n>-<unit>` (`days`, `weeks`, `months`, `years`, `hours`,
/// `minutes`), `this-<period>` (`day`, `week`, `month`, `year`) and any
/// absolute form understood by [`parse_date`]. Day-based anchors snap to
/// the start of the day. Anchors outside the representable range resolve
/// to `None`.
pub fn resolve_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = text.trim().to_ascii_lowercase();
    let today = now.date_naive();

    if let Some(rest) = lower.strip_prefix("now-") {
        let (amount, unit) = rest.split_once('-')?;
        let amount: u32 = amount.parse().ok()?;
        return match unit {
            "minutes" | "minute" => now.checked_sub_signed(TimeDelta::try_minutes(amount.into())?),
            "hours" | "hour" => now.checked_sub_signed(TimeDelta::try_hours(amount.into())?),
            "days" | "day" => today
                .checked_sub_signed(TimeDelta::try_days(amount.into())?)
                .and_then(start_of),
            "weeks" | "week" => today
                .checked_sub_signed(TimeDelta::try_weeks(amount.into())?)
                .and_then(start_of),
            "months" | "month" => today.checked_sub_months(Months::new(amount)).and_then(start_of),
            "years" | "year" => today
                .checked_sub_months(Months::new(amount.checked_mul(12)?))
                .and_then(start_of),
            _ => None,
        };
    }

    if let Some(period) = lower.strip_prefix("this-") {
        let first = match period {
            "day" | "days" => today,
            "week" | "weeks" => {
                today.checked_sub_signed(TimeDelta::try_days(today.weekday().num_days_from_monday().into())?)?
            }
            "month" => today.with_day(1)?,
            "year" => NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
            _ => return None,
        };
        return start_of(first);
    }

    parse_date(text)
}

/// Current UTC time as an RFC 3339 string
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

fn start_of(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 15, 30, 0).unwrap()
    }

    #[test]
    fn test_parse_absolute_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2024-01-02"), Some(expected));
        assert_eq!(parse_date("2024-01-02T00:00:00Z"), Some(expected));
        assert_eq!(parse_date("2024-01-02 00:00:00"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("42"), None);
    }

    #[test]
    fn test_relative_anchors_snap_to_day_start() {
        let now = fixed_now();
        assert_eq!(
            resolve_date("now-7-days", now),
            Some(Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap())
        );
        assert_eq!(
            resolve_date("now-1-months", now),
            Some(Utc.with_ymd_and_hms(2024, 2, 14, 0, 0, 0).unwrap())
        );
        assert_eq!(
            resolve_date("now-2-hours", now),
            Some(Utc.with_ymd_and_hms(2024, 3, 14, 13, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_out_of_range_offsets_resolve_to_none() {
        let now = fixed_now();
        assert_eq!(resolve_date("now-100000000-days", now), None);
        assert_eq!(resolve_date("now-4000000000-hours", now), None);
        assert_eq!(resolve_date("now-4000000000-minutes", now), None);
        assert_eq!(resolve_date("now-100000000-weeks", now), None);
        assert_eq!(resolve_date("now-4000000000-years", now), None);
    }

    #[test]
    fn test_this_period_anchors() {
        let now = fixed_now(); // a Thursday
        assert_eq!(
            resolve_date("this-month", now),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            resolve_date("this-week", now),
            Some(Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap())
        );
        assert_eq!(
            resolve_date("this-year", now),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }
}
