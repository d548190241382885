//! ICS import logic for the saison calendar module.
//
// The `ical` reader handles line unfolding and BEGIN/END nesting; this module
// maps VEVENT and VALARM properties onto `ParsedEvent`.

use super::{parse_ical_recurrence, parse_ics_datetime, parse_ics_duration, unescape_text};
use super::{IcsError, ParsedEvent};
use ical::parser::ical::component::{IcalAlarm, IcalEvent};
use ical::property::Property;
use ical::IcalParser;
use log::{debug, info, warn};
use std::path::Path;

/// Parse calendar text into events, preserving document order.
///
/// Blank input and calendars without any VEVENT are reported as
/// `IcsError::EmptyFile`. The first invalid event aborts the whole import.
pub fn parse(text: &str) -> Result<Vec<ParsedEvent>, IcsError> {
    if text.trim().is_empty() {
        return Err(IcsError::EmptyFile);
    }

    let mut events = Vec::new();
    for calendar in IcalParser::new(text.as_bytes()) {
        let calendar = calendar.map_err(|e| IcsError::parse(e.to_string()))?;
        for (index, event) in calendar.events.iter().enumerate() {
            let parsed = parse_event(event).map_err(|e| {
                debug!("VEVENT #{} rejected: {}", index + 1, e);
                e
            })?;
            events.push(parsed);
        }
    }

    if events.is_empty() {
        return Err(IcsError::EmptyFile);
    }

    info!("Parsed {} event(s) from calendar data", events.len());
    Ok(events)
}

/// Import events from an ICS file
pub fn import_ics_file(file_path: &Path) -> Result<Vec<ParsedEvent>, IcsError> {
    debug!("Reading calendar file {}", file_path.display());
    let text = std::fs::read_to_string(file_path)?;
    parse(&text)
}

fn parse_event(event: &IcalEvent) -> Result<ParsedEvent, IcsError> {
    let props = &event.properties;

    let summary = unescape_text(required_value(props, "SUMMARY")?);
    let start_time = parse_ics_datetime(required_value(props, "DTSTART")?)?;
    let end_time = parse_ics_datetime(required_value(props, "DTEND")?)?;
    if end_time <= start_time {
        return Err(IcsError::parse(format!(
            "event '{}' ends at {} which is not after its start {}",
            summary, end_time, start_time
        )));
    }

    for name in ["DTSTART", "DTEND"] {
        if let Some(tzid) = find_property(props, name).and_then(|p| param_value(p, "TZID")) {
            debug!("{} carries TZID={}, keeping wall-clock value", name, tzid);
        }
    }

    let recurrence = optional_value(props, "RRULE").map(parse_ical_recurrence).transpose()?;
    let alarm_minutes_before_start = alarm_minutes(&event.alarms)?;

    Ok(ParsedEvent {
        summary,
        location: optional_value(props, "LOCATION").map(unescape_text),
        description: optional_value(props, "DESCRIPTION").map(unescape_text),
        start_time,
        end_time,
        recurrence,
        alarm_minutes_before_start,
    })
}

/// Minutes before start of the first alarm that fires relative to the start.
fn alarm_minutes(alarms: &[IcalAlarm]) -> Result<Option<u32>, IcsError> {
    for alarm in alarms {
        let Some(trigger) = find_property(&alarm.properties, "TRIGGER") else {
            continue;
        };
        if param_value(trigger, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE-TIME")) {
            debug!("Skipping absolute alarm trigger");
            continue;
        }
        if param_value(trigger, "RELATED").is_some_and(|v| v.eq_ignore_ascii_case("END")) {
            debug!("Skipping alarm related to event end");
            continue;
        }
        let Some(value) = trigger.value.as_deref().filter(|v| !v.trim().is_empty()) else {
            return Err(IcsError::parse("TRIGGER without a value"));
        };

        let seconds = parse_ics_duration(value)?;
        if seconds > 0 {
            warn!("Skipping alarm {} after event start", value);
            continue;
        }
        let minutes = u32::try_from(seconds.unsigned_abs() / 60)
            .map_err(|_| IcsError::format(format!("alarm offset too large '{}'", value)))?;
        return Ok(Some(minutes));
    }
    Ok(None)
}

fn find_property<'a>(props: &'a [Property], name: &str) -> Option<&'a Property> {
    props.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

fn param_value<'a>(prop: &'a Property, name: &str) -> Option<&'a str> {
    prop.params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

fn optional_value<'a>(props: &'a [Property], name: &str) -> Option<&'a str> {
    find_property(props, name)
        .and_then(|p| p.value.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn required_value<'a>(props: &'a [Property], name: &str) -> Result<&'a str, IcsError> {
    match find_property(props, name) {
        None => Err(IcsError::parse(format!("VEVENT is missing {}", name))),
        Some(_) => optional_value(props, name)
            .ok_or_else(|| IcsError::parse(format!("VEVENT has an empty {}", name))),
    }
}
