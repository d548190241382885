//! Current cycle and next due date for each cycle kind.

use super::routine_custom::{custom_next_active_date, custom_window};
use super::{custom_rule, CycleConfig, CycleError, CycleWindow};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use log::debug;

/// The cycle window that contains `reference`.
pub fn current_cycle(
    config: &CycleConfig,
    reference: NaiveDate,
) -> Result<CycleWindow, CycleError> {
    config.validate()?;
    let window = match config {
        CycleConfig::Daily { .. } => CycleWindow::new(reference, reference),
        CycleConfig::Weekly { days_of_week } => weekly_window(days_of_week, reference)?,
        CycleConfig::Monthly { days_of_month } => monthly_window(days_of_month, reference)?,
        CycleConfig::Custom { rrule } => custom_window(&custom_rule(rrule)?, reference)?,
    };
    debug!("{} cycle for {}: {}", config.kind(), reference, window);
    Ok(window)
}

/// The earliest date strictly after `after` on which the routine is due.
pub fn next_active_date(config: &CycleConfig, after: NaiveDate) -> Result<NaiveDate, CycleError> {
    config.validate()?;
    match config {
        CycleConfig::Daily { .. } => after.succ_opt().ok_or(CycleError::OutOfRange),
        CycleConfig::Weekly { days_of_week } => next_weekly(days_of_week, after),
        CycleConfig::Monthly { days_of_month } => next_monthly(days_of_month, after),
        CycleConfig::Custom { rrule } => custom_next_active_date(&custom_rule(rrule)?, after),
    }
}

/// Number of check-ins recorded inside the cycle containing `reference`
pub fn checkins_in_current_cycle<'a, I>(
    config: &CycleConfig,
    reference: NaiveDate,
    checkins: I,
) -> Result<usize, CycleError>
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    Ok(current_cycle(config, reference)?.count_checkins(checkins))
}

// Blocks start on the earliest configured weekday in Monday-first order, which
// partitions the calendar into the same 7-day blocks for every reference date.
fn weekly_window(days: &[Weekday], reference: NaiveDate) -> Result<CycleWindow, CycleError> {
    let anchor = days
        .iter()
        .map(|d| d.num_days_from_monday())
        .min()
        .ok_or_else(|| CycleError::config("weekly cycle needs at least one weekday"))?;
    let offset = (7 + reference.weekday().num_days_from_monday() - anchor) % 7;
    let start = reference
        .checked_sub_days(Days::new(u64::from(offset)))
        .ok_or(CycleError::OutOfRange)?;
    let end = start.checked_add_days(Days::new(6)).ok_or(CycleError::OutOfRange)?;
    Ok(CycleWindow::new(start, end))
}

fn next_weekly(days: &[Weekday], after: NaiveDate) -> Result<NaiveDate, CycleError> {
    for step in 1..=7 {
        let candidate = after.checked_add_days(Days::new(step)).ok_or(CycleError::OutOfRange)?;
        if days.contains(&candidate.weekday()) {
            return Ok(candidate);
        }
    }
    Err(CycleError::config("weekly cycle needs at least one weekday"))
}

fn monthly_window(days: &[u32], reference: NaiveDate) -> Result<CycleWindow, CycleError> {
    let (year, month) = (reference.year(), reference.month());
    let markers = month_markers(days, year, month)?;

    match markers.iter().rposition(|marker| *marker <= reference) {
        Some(i) => {
            let next = match markers.get(i + 1) {
                Some(next) => *next,
                None => {
                    let (next_year, next_month) = shift_month(year, month, 1);
                    first_marker(days, next_year, next_month)?
                }
            };
            Ok(CycleWindow::new(markers[i], next.pred_opt().ok_or(CycleError::OutOfRange)?))
        }
        None => {
            let (prev_year, prev_month) = shift_month(year, month, -1);
            let start = *month_markers(days, prev_year, prev_month)?
                .last()
                .ok_or_else(|| {
                    CycleError::config("monthly cycle needs at least one day of month")
                })?;
            let end = first_marker(days, year, month)?.pred_opt().ok_or(CycleError::OutOfRange)?;
            Ok(CycleWindow::new(start, end))
        }
    }
}

fn next_monthly(days: &[u32], after: NaiveDate) -> Result<NaiveDate, CycleError> {
    let (year, month) = (after.year(), after.month());
    if let Some(marker) = month_markers(days, year, month)?.into_iter().find(|m| *m > after) {
        return Ok(marker);
    }
    let (next_year, next_month) = shift_month(year, month, 1);
    first_marker(days, next_year, next_month)
}

fn first_marker(days: &[u32], year: i32, month: u32) -> Result<NaiveDate, CycleError> {
    month_markers(days, year, month)?
        .first()
        .copied()
        .ok_or_else(|| CycleError::config("monthly cycle needs at least one day of month"))
}

/// Configured days of month as dates in the given month, clamped to its
/// last day, sorted and deduplicated.
fn month_markers(days: &[u32], year: i32, month: u32) -> Result<Vec<NaiveDate>, CycleError> {
    let last = days_in_month(year, month)?;
    let mut markers = days
        .iter()
        .map(|d| NaiveDate::from_ymd_opt(year, month, (*d).min(last)).ok_or(CycleError::OutOfRange))
        .collect::<Result<Vec<_>, _>>()?;
    markers.sort();
    markers.dedup();
    Ok(markers)
}

pub(crate) fn days_in_month(year: i32, month: u32) -> Result<u32, CycleError> {
    let (next_year, next_month) = shift_month(year, month, 1);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .ok_or(CycleError::OutOfRange)
}

pub(crate) fn shift_month(year: i32, month: u32, delta: i64) -> (i32, u32) {
    let index = i64::from(year) * 12 + i64::from(month) - 1 + delta;
    (index.div_euclid(12) as i32, index.rem_euclid(12) as u32 + 1)
}
