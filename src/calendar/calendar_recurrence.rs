//! RRULE decoding.
//
// Shared by the VEVENT importer and by custom routine cycles.

use super::{parse_ics_datetime, parse_weekday_code, weekday_code, IcsError};
use chrono::{NaiveDateTime, Weekday};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn to_rfc5545(&self) -> &'static str {
        match self {
            Frequency::Secondly => "SECONDLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    pub fn is_sub_daily(&self) -> bool {
        matches!(self, Frequency::Secondly | Frequency::Minutely | Frequency::Hourly)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_rfc5545())
    }
}

impl FromStr for Frequency {
    type Err = IcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SECONDLY" => Ok(Frequency::Secondly),
            "MINUTELY" => Ok(Frequency::Minutely),
            "HOURLY" => Ok(Frequency::Hourly),
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            other => Err(IcsError::parse(format!("unknown recurrence frequency '{}'", other))),
        }
    }
}

/// Decoded recurrence rule of an event or custom routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceInfo {
    pub frequency: Frequency,
    pub interval: u32,
    pub until: Option<NaiveDateTime>,
    #[serde(default)]
    pub by_day: Vec<Weekday>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub by_month_day: Vec<i8>,
}

impl RecurrenceInfo {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            until: None,
            by_day: Vec::new(),
            count: None,
            by_month_day: Vec::new(),
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn with_until(mut self, until: NaiveDateTime) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_days(mut self, days: &[Weekday]) -> Self {
        self.by_day.clear();
        for day in days {
            if !self.by_day.contains(day) {
                self.by_day.push(*day);
            }
        }
        self
    }
}

impl FromStr for RecurrenceInfo {
    type Err = IcsError;

    fn from_str(rule: &str) -> Result<Self, Self::Err> {
        parse_ical_recurrence(rule)
    }
}

impl fmt::Display for RecurrenceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={};INTERVAL={}", self.frequency, self.interval)?;
        if let Some(count) = self.count {
            write!(f, ";COUNT={}", count)?;
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}", until.format("%Y%m%dT%H%M%S"))?;
        }
        if !self.by_day.is_empty() {
            let days: Vec<&str> = self.by_day.iter().map(|d| weekday_code(*d)).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        if !self.by_month_day.is_empty() {
            let days: Vec<String> = self.by_month_day.iter().map(|d| d.to_string()).collect();
            write!(f, ";BYMONTHDAY={}", days.join(","))?;
        }
        Ok(())
    }
}

/// Parse an iCal recurrence rule value such as `FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE`.
///
/// Unknown keys are ignored. A leading `RRULE:` is tolerated.
pub fn parse_ical_recurrence(rrule: &str) -> Result<RecurrenceInfo, IcsError> {
    let rule = rrule.trim();
    let rule = match rule.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("RRULE:") => &rule[6..],
        _ => rule,
    };

    let mut frequency = None;
    let mut interval = 1;
    let mut until = None;
    let mut by_day: Vec<Weekday> = Vec::new();
    let mut count = None;
    let mut by_month_day = Vec::new();

    for part in rule.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| IcsError::parse(format!("malformed recurrence part '{}'", part)))?;
        let value = value.trim();

        match key.trim().to_ascii_uppercase().as_str() {
            "FREQ" => frequency = Some(value.parse::<Frequency>()?),
            "INTERVAL" => interval = parse_positive("INTERVAL", value)?,
            "COUNT" => count = Some(parse_positive("COUNT", value)?),
            "UNTIL" => until = Some(parse_ics_datetime(value)?),
            "BYDAY" => {
                by_day.clear();
                for entry in value.split(',') {
                    let day = parse_by_day_entry(entry)?;
                    if !by_day.contains(&day) {
                        by_day.push(day);
                    }
                }
            }
            "BYMONTHDAY" => {
                by_month_day.clear();
                for day in value.split(',') {
                    let parsed: i8 = day.trim().parse().map_err(|_| {
                        IcsError::parse(format!("invalid BYMONTHDAY value '{}'", day))
                    })?;
                    if parsed == 0 || !(-31..=31).contains(&parsed) {
                        return Err(IcsError::parse(format!("BYMONTHDAY out of range: {}", parsed)));
                    }
                    if !by_month_day.contains(&parsed) {
                        by_month_day.push(parsed);
                    }
                }
            }
            other => debug!("Ignoring unsupported recurrence key '{}'", other),
        }
    }

    let frequency = frequency
        .ok_or_else(|| IcsError::parse(format!("recurrence rule without FREQ: '{}'", rrule)))?;

    Ok(RecurrenceInfo { frequency, interval, until, by_day, count, by_month_day })
}

/// Decode one BYDAY entry. A leading ordinal (`2TU`, `-1FR`) is accepted and dropped.
fn parse_by_day_entry(entry: &str) -> Result<Weekday, IcsError> {
    let entry = entry.trim();
    let invalid = || IcsError::parse(format!("invalid BYDAY code '{}'", entry));
    let split = entry
        .len()
        .checked_sub(2)
        .filter(|&i| entry.is_char_boundary(i))
        .ok_or_else(invalid)?;
    let (ordinal, code) = entry.split_at(split);
    let day = parse_weekday_code(code).ok_or_else(invalid)?;

    if !ordinal.is_empty() {
        match ordinal.parse::<i8>() {
            Ok(n) if n != 0 && (-53..=53).contains(&n) => {
                debug!("Ignoring BYDAY ordinal {} on {}", n, code)
            }
            _ => return Err(invalid()),
        }
    }
    Ok(day)
}

fn parse_positive(key: &str, value: &str) -> Result<u32, IcsError> {
    match value.parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(IcsError::parse(format!("{} must be a positive integer, got '{}'", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_weekly_without_until() {
        let rule = parse_ical_recurrence("FREQ=WEEKLY;INTERVAL=1").unwrap();
        assert_eq!(rule, RecurrenceInfo::new(Frequency::Weekly));
        assert_eq!(rule.frequency.to_string(), "WEEKLY");
        assert_eq!(rule.interval, 1);
        assert_eq!(rule.until, None);
    }

    #[test]
    fn test_full_rule() {
        let rule: RecurrenceInfo =
            "RRULE:freq=weekly;UNTIL=20251231T160000Z;INTERVAL=2;BYDAY=MO,WE,MO;WKST=SU".parse().unwrap();
        let until = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap().and_hms_opt(16, 0, 0).unwrap();
        assert_eq!(
            rule,
            RecurrenceInfo::new(Frequency::Weekly)
                .with_interval(2)
                .with_until(until)
                .with_days(&[Weekday::Mon, Weekday::Wed])
        );
    }

    #[test]
    fn test_missing_interval_defaults_to_one() {
        let rule = parse_ical_recurrence("FREQ=DAILY").unwrap();
        assert_eq!(rule.interval, 1);
    }

    #[test]
    fn test_month_days_and_count() {
        let rule = parse_ical_recurrence("FREQ=MONTHLY;BYMONTHDAY=1,15,-1;COUNT=6").unwrap();
        assert_eq!(rule.by_month_day, vec![1, 15, -1]);
        assert_eq!(rule.count, Some(6));
    }

    #[test_case("INTERVAL=2" ; "missing freq")]
    #[test_case("FREQ=FORTNIGHTLY" ; "unknown freq")]
    #[test_case("FREQ=DAILY;INTERVAL=0" ; "zero interval")]
    #[test_case("FREQ=DAILY;INTERVAL=two" ; "non numeric interval")]
    #[test_case("FREQ=WEEKLY;BYDAY=MO,XX" ; "bad weekday")]
    #[test_case("FREQ=MONTHLY;BYDAY=0MO" ; "zero ordinal")]
    #[test_case("FREQ=MONTHLY;BYDAY=54MO" ; "ordinal out of range")]
    #[test_case("FREQ=MONTHLY;BYDAY=2XX" ; "ordinal with bad weekday")]
    #[test_case("FREQ=MONTHLY;BYDAY=X" ; "single character")]
    #[test_case("FREQ=MONTHLY;BYMONTHDAY=32" ; "month day out of range")]
    #[test_case("FREQ=DAILY;GARBAGE" ; "part without value")]
    fn test_malformed_rules(rule: &str) {
        assert!(matches!(parse_ical_recurrence(rule), Err(IcsError::Parse(_))));
    }

    #[test_case("FREQ=MONTHLY;BYDAY=2TU", &[Weekday::Tue] ; "second tuesday")]
    #[test_case("FREQ=MONTHLY;BYDAY=-1FR", &[Weekday::Fri] ; "last friday")]
    #[test_case("FREQ=YEARLY;BYDAY=+20MO,1MO,WE", &[Weekday::Mon, Weekday::Wed] ; "mixed entries")]
    fn test_by_day_ordinals(rule: &str, days: &[Weekday]) {
        let rule = parse_ical_recurrence(rule).unwrap();
        assert_eq!(rule.by_day, days);
    }

    #[test]
    fn test_bad_until_is_format_error() {
        let result = parse_ical_recurrence("FREQ=DAILY;UNTIL=2025-12-31");
        assert!(matches!(result, Err(IcsError::InvalidFormat(_))));
    }

    #[test]
    fn test_display_is_decodable() {
        let text = "FREQ=WEEKLY;INTERVAL=2;UNTIL=20251231T160000;BYDAY=TU,TH";
        let rule = parse_ical_recurrence(text).unwrap();
        assert_eq!(rule.to_string(), text);
    }
}
