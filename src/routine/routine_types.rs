//! Cycle configuration and its persisted encoding.

use super::CycleError;
use crate::calendar::{parse_ical_recurrence, RecurrenceInfo};
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How often a routine task comes due.
///
/// Persisted as JSON discriminated by `type`, e.g.
/// `{"type":"weekly","daysOfWeek":["MONDAY","FRIDAY"]}`. Unknown `type`
/// values are rejected when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CycleConfig {
    Daily {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<NaiveTime>,
    },
    Weekly {
        #[serde(rename = "daysOfWeek", with = "weekday_names")]
        days_of_week: Vec<Weekday>,
    },
    Monthly {
        #[serde(rename = "daysOfMonth")]
        days_of_month: Vec<u32>,
    },
    Custom {
        rrule: String,
    },
}

impl CycleConfig {
    pub fn daily() -> Self {
        CycleConfig::Daily { time: None }
    }

    pub fn weekly(days: &[Weekday]) -> Self {
        CycleConfig::Weekly { days_of_week: days.to_vec() }
    }

    pub fn monthly(days: &[u32]) -> Self {
        CycleConfig::Monthly { days_of_month: days.to_vec() }
    }

    pub fn custom(rrule: impl Into<String>) -> Self {
        CycleConfig::Custom { rrule: rrule.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CycleConfig::Daily { .. } => "daily",
            CycleConfig::Weekly { .. } => "weekly",
            CycleConfig::Monthly { .. } => "monthly",
            CycleConfig::Custom { .. } => "custom",
        }
    }

    pub fn encode(&self) -> Result<String, CycleError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, CycleError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reject configurations the calculator cannot evaluate.
    pub fn validate(&self) -> Result<(), CycleError> {
        match self {
            CycleConfig::Daily { .. } => Ok(()),
            CycleConfig::Weekly { days_of_week } => {
                if days_of_week.is_empty() {
                    return Err(CycleError::config("weekly cycle needs at least one weekday"));
                }
                Ok(())
            }
            CycleConfig::Monthly { days_of_month } => {
                if days_of_month.is_empty() {
                    return Err(CycleError::config("monthly cycle needs at least one day of month"));
                }
                if let Some(day) = days_of_month.iter().find(|d| !(1..=31).contains(*d)) {
                    return Err(CycleError::config(format!(
                        "day of month {} is not within 1-31",
                        day
                    )));
                }
                Ok(())
            }
            CycleConfig::Custom { rrule } => custom_rule(rrule).map(|_| ()),
        }
    }
}

/// Decode the rule of a custom cycle, rejecting frequencies finer than a day.
pub(crate) fn custom_rule(rrule: &str) -> Result<RecurrenceInfo, CycleError> {
    let rule = parse_ical_recurrence(rrule)?;
    if rule.frequency.is_sub_daily() {
        return Err(CycleError::config(format!(
            "{} recurrence is too fine for a routine cycle",
            rule.frequency
        )));
    }
    Ok(rule)
}

/// Inclusive date range of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CycleWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn count_checkins<'a, I>(&self, checkins: I) -> usize
    where
        I: IntoIterator<Item = &'a NaiveDate>,
    {
        checkins.into_iter().filter(|d| self.contains(**d)).count()
    }
}

impl From<CycleWindow> for (NaiveDate, NaiveDate) {
    fn from(window: CycleWindow) -> Self {
        (window.start, window.end)
    }
}

impl fmt::Display for CycleWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

mod weekday_names {
    use super::weekday_name;
    use chrono::Weekday;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(days: &[Weekday], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(days.iter().map(|d| weekday_name(*d)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Weekday>, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|name| {
                name.parse::<Weekday>()
                    .map_err(|_| de::Error::custom(format!("invalid weekday '{}'", name)))
            })
            .collect()
    }
}
