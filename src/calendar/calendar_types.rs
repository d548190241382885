//! Records produced by the ICS importer.

use super::RecurrenceInfo;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single VEVENT decoded from a calendar file.
///
/// All date-times are wall-clock values. A `TZID` parameter on the source
/// property is accepted but its offset is never applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEvent {
    pub summary: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub recurrence: Option<RecurrenceInfo>,
    pub alarm_minutes_before_start: Option<u32>,
}

impl ParsedEvent {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Wall-clock time at which the reminder should fire, if the event has one
    pub fn alarm_time(&self) -> Option<NaiveDateTime> {
        self.alarm_minutes_before_start
            .map(|minutes| self.start_time - Duration::minutes(i64::from(minutes)))
    }
}
