//! Value decoders for calendar properties.
//
// Date-times, RFC 5545 durations, weekday codes and TEXT escapes.

use super::IcsError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

static DATE_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{8})(?:T(\d{6}))?[Zz]?$").unwrap());

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-])?P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").unwrap()
});

/// Decode `YYYYMMDDTHHMMSS`, the same with a trailing `Z`, or a bare `YYYYMMDD`.
///
/// The result is always wall-clock time: a UTC marker or a `TZID` parameter
/// on the property does not shift the value.
pub fn parse_ics_datetime(value: &str) -> Result<NaiveDateTime, IcsError> {
    let value = value.trim();
    let captures = DATE_TIME_RE
        .captures(value)
        .ok_or_else(|| IcsError::format(format!("unsupported date-time '{}'", value)))?;

    let date = NaiveDate::parse_from_str(&captures[1], "%Y%m%d")
        .map_err(|e| IcsError::format(format!("invalid date '{}': {}", value, e)))?;
    let time = match captures.get(2) {
        Some(time) => NaiveTime::parse_from_str(time.as_str(), "%H%M%S")
            .map_err(|e| IcsError::format(format!("invalid time '{}': {}", value, e)))?,
        None => NaiveTime::MIN,
    };

    Ok(date.and_time(time))
}

/// Decode an RFC 5545 duration (`-PT20M`, `-PT1H`, `-P1DT2H`, `P1W`) into signed seconds.
pub fn parse_ics_duration(value: &str) -> Result<i64, IcsError> {
    let value = value.trim();
    let captures = DURATION_RE
        .captures(value)
        .ok_or_else(|| IcsError::format(format!("unsupported duration '{}'", value)))?;

    let units = [(2, 7 * 86_400), (3, 86_400), (4, 3_600), (5, 60), (6, 1)];
    let mut seconds: i64 = 0;
    let mut seen_component = false;
    for (group, unit) in units {
        if let Some(amount) = captures.get(group) {
            let amount: i64 = amount
                .as_str()
                .parse()
                .map_err(|_| IcsError::format(format!("duration out of range '{}'", value)))?;
            seconds = amount
                .checked_mul(unit)
                .and_then(|part| seconds.checked_add(part))
                .ok_or_else(|| IcsError::format(format!("duration out of range '{}'", value)))?;
            seen_component = true;
        }
    }

    if !seen_component {
        return Err(IcsError::format(format!("empty duration '{}'", value)));
    }

    match captures.get(1).map(|sign| sign.as_str()) {
        Some("-") => Ok(-seconds),
        _ => Ok(seconds),
    }
}

/// Map a two letter RRULE weekday code (`MO`..`SU`) to a `Weekday`.
pub fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Undo TEXT escaping (`\n`, `\,`, `\;`, `\\`).
pub fn unescape_text(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => output.push('\n'),
            Some(escaped @ (',' | ';' | '\\')) => output.push(escaped),
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("20250827T153000", 2025, 8, 27, 15, 30 ; "basic")]
    #[test_case("20251231T160000Z", 2025, 12, 31, 16, 0 ; "utc marker kept as wall clock")]
    #[test_case("20250901", 2025, 9, 1, 0, 0 ; "date only")]
    fn test_parse_ics_datetime(value: &str, y: i32, m: u32, d: u32, h: u32, min: u32) {
        let expected = NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap();
        assert_eq!(parse_ics_datetime(value).unwrap(), expected);
    }

    #[test_case("2025-08-27T15:30:00" ; "extended format")]
    #[test_case("20251327T153000" ; "month out of range")]
    #[test_case("20250827T256000" ; "hour out of range")]
    #[test_case("tomorrow" ; "free text")]
    #[test_case("" ; "empty")]
    fn test_parse_ics_datetime_rejects(value: &str) {
        assert!(matches!(parse_ics_datetime(value), Err(IcsError::InvalidFormat(_))));
    }

    #[test_case("-PT20M", -1200 ; "minutes before")]
    #[test_case("-PT1H", -3600 ; "hours before")]
    #[test_case("-P1DT2H30M", -95_400 ; "combined components")]
    #[test_case("P1W", 604_800 ; "weeks after")]
    #[test_case("+PT0S", 0 ; "explicit zero")]
    fn test_parse_ics_duration(value: &str, seconds: i64) {
        assert_eq!(parse_ics_duration(value).unwrap(), seconds);
    }

    #[test_case("-PT" ; "no components")]
    #[test_case("P" ; "bare designator")]
    #[test_case("-20M" ; "missing designator")]
    #[test_case("-PT20X" ; "unknown unit")]
    fn test_parse_ics_duration_rejects(value: &str) {
        assert!(matches!(parse_ics_duration(value), Err(IcsError::InvalidFormat(_))));
    }

    #[test]
    fn test_weekday_codes() {
        assert_eq!(parse_weekday_code("mo"), Some(Weekday::Mon));
        assert_eq!(parse_weekday_code("SU"), Some(Weekday::Sun));
        assert_eq!(parse_weekday_code("XX"), None);
        assert_eq!(weekday_code(Weekday::Fri), "FR");
    }

    #[test]
    fn test_unescape_text() {
        assert_eq!(unescape_text(r"Room 101\, Building A"), "Room 101, Building A");
        assert_eq!(unescape_text(r"line one\nline two"), "line one\nline two");
        assert_eq!(unescape_text(r"a\;b\\c"), r"a;b\c");
        assert_eq!(unescape_text(r"keep \x"), r"keep \x");
    }
}
