//! Evaluation of custom cycles described by an RRULE.
//
// Periods (days, Monday-based weeks, months, years) are numbered from
// 0001-01-01, which is a Monday. A cycle is the block of `interval` periods
// containing the reference date; only the first period of a block has
// active dates.

use super::routine_cycle::days_in_month;
use super::{CycleError, CycleWindow};
use crate::calendar::{Frequency, RecurrenceInfo};
use chrono::{Datelike, Days, NaiveDate};

// Upper bound on blocks inspected when looking for the next active date
const MAX_BLOCKS_SCANNED: usize = 48;

pub(crate) fn custom_window(
    rule: &RecurrenceInfo,
    reference: NaiveDate,
) -> Result<CycleWindow, CycleError> {
    let interval = i64::from(rule.interval);
    let block = block_start(rule.frequency, reference, interval);
    let start = period_start(rule.frequency, block)?;
    let end = period_start(rule.frequency, block + interval)?
        .pred_opt()
        .ok_or(CycleError::OutOfRange)?;

    if let Some(until) = rule.until {
        let first_active = active_dates(rule, block)?.first().copied().unwrap_or(start);
        if first_active > until.date() {
            return Err(CycleError::RecurrenceEnded(until));
        }
    }
    Ok(CycleWindow::new(start, end))
}

pub(crate) fn custom_next_active_date(
    rule: &RecurrenceInfo,
    after: NaiveDate,
) -> Result<NaiveDate, CycleError> {
    let interval = i64::from(rule.interval);
    let mut block = block_start(rule.frequency, after, interval);

    for _ in 0..MAX_BLOCKS_SCANNED {
        if let Some(candidate) = active_dates(rule, block)?.into_iter().find(|d| *d > after) {
            if let Some(until) = rule.until {
                if candidate > until.date() {
                    return Err(CycleError::RecurrenceEnded(until));
                }
            }
            return Ok(candidate);
        }
        block += interval;
    }

    Err(CycleError::config(format!("recurrence rule '{}' never becomes active", rule)))
}

fn block_start(frequency: Frequency, date: NaiveDate, interval: i64) -> i64 {
    period_index(frequency, date).div_euclid(interval) * interval
}

fn period_index(frequency: Frequency, date: NaiveDate) -> i64 {
    let day = i64::from(date.num_days_from_ce());
    match frequency {
        Frequency::Weekly => (day - 1).div_euclid(7),
        Frequency::Monthly => i64::from(date.year()) * 12 + i64::from(date.month0()),
        Frequency::Yearly => i64::from(date.year()),
        _ => day,
    }
}

fn period_start(frequency: Frequency, index: i64) -> Result<NaiveDate, CycleError> {
    let date = match frequency {
        Frequency::Weekly => from_day_number(index.checked_mul(7).and_then(|d| d.checked_add(1))),
        Frequency::Monthly => i32::try_from(index.div_euclid(12))
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, index.rem_euclid(12) as u32 + 1, 1)),
        Frequency::Yearly => {
            i32::try_from(index).ok().and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        }
        _ => from_day_number(Some(index)),
    };
    date.ok_or(CycleError::OutOfRange)
}

fn from_day_number(day: Option<i64>) -> Option<NaiveDate> {
    day.and_then(|d| i32::try_from(d).ok()).and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Active dates of the period `index`, sorted ascending.
fn active_dates(rule: &RecurrenceInfo, index: i64) -> Result<Vec<NaiveDate>, CycleError> {
    let start = period_start(rule.frequency, index)?;
    let mut dates = match rule.frequency {
        Frequency::Weekly if !rule.by_day.is_empty() => rule
            .by_day
            .iter()
            .map(|day| {
                start
                    .checked_add_days(Days::new(u64::from(day.num_days_from_monday())))
                    .ok_or(CycleError::OutOfRange)
            })
            .collect::<Result<Vec<_>, _>>()?,
        Frequency::Monthly if !rule.by_month_day.is_empty() => {
            let last = i64::from(days_in_month(start.year(), start.month())?);
            rule.by_month_day
                .iter()
                .map(|d| if *d > 0 { i64::from(*d) } else { last + 1 + i64::from(*d) })
                .filter(|d| (1..=last).contains(d))
                .filter_map(|d| start.with_day(d as u32))
                .collect()
        }
        _ => vec![start],
    };
    dates.sort();
    dates.dedup();
    Ok(dates)
}
