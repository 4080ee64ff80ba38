use crate::recurrence::{PatternError, PatternFields, RecurrencePattern, RecurrenceRule};
use chrono::{Datelike, Months, NaiveDate, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on calculator steps when expanding a single pattern over a window.
const MAX_EXPANSION_STEPS: usize = 10_000;

/// What to do when a pattern asks for a day the target month does not have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOverflow {
    /// Spill the extra days into the next month (Feb 30 -> Mar 2).
    #[default]
    RollOver,
    /// Use the last day of the target month.
    Clamp,
    /// Fail the calculation.
    Reject,
}

impl DayOverflow {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOverflow::RollOver => "roll_over",
            DayOverflow::Clamp => "clamp",
            DayOverflow::Reject => "reject",
        }
    }
}

impl FromStr for DayOverflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "roll_over" | "rollover" => Ok(DayOverflow::RollOver),
            "clamp" => Ok(DayOverflow::Clamp),
            "reject" => Ok(DayOverflow::Reject),
            other => Err(format!("unknown day overflow policy '{other}'")),
        }
    }
}

/// How the annual rule decides between this year and next year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnualRule {
    /// Compares the zero-based month of the reference date against the
    /// one-based `monthOfYear`. Inside the target month this can yield a
    /// date on or before the reference date.
    #[default]
    Legacy,
    /// First matching date strictly after the reference date.
    NextAfter,
}

impl AnnualRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnualRule::Legacy => "legacy",
            AnnualRule::NextAfter => "next_after",
        }
    }
}

impl FromStr for AnnualRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(AnnualRule::Legacy),
            "next_after" | "nextafter" => Ok(AnnualRule::NextAfter),
            other => Err(format!("unknown annual rule '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrencePolicy {
    #[serde(default)]
    pub day_overflow: DayOverflow,
    #[serde(default)]
    pub annual_rule: AnnualRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OccurrenceError {
    #[error("invalid recurrence pattern: {0}")]
    InvalidPattern(#[from] PatternError),
    #[error("{year}-{month:02}-{day:02} does not exist")]
    NonexistentDate { year: i32, month: u32, day: u32 },
    #[error("date arithmetic out of range")]
    OutOfRange,
}

pub fn next_occurrence(
    pattern: &RecurrencePattern,
    from: NaiveDate,
) -> Result<Option<NaiveDate>, OccurrenceError> {
    next_occurrence_with(pattern, from, OccurrencePolicy::default())
}

/// Next date after `from` satisfying `pattern`.
///
/// `Ok(None)` means the pattern has ended; `Err` means the date could not be
/// computed. Failures are logged here so callers may discard them.
pub fn next_occurrence_with(
    pattern: &RecurrencePattern,
    from: NaiveDate,
    policy: OccurrencePolicy,
) -> Result<Option<NaiveDate>, OccurrenceError> {
    match compute(pattern, from, policy) {
        Ok(date) => match pattern.end_date {
            Some(end) if date > end => {
                debug!(%from, %date, %end, "occurrence falls after pattern end date");
                Ok(None)
            }
            _ => Ok(Some(date)),
        },
        Err(err) => {
            warn!(%from, pattern = %pattern, error = %err, "next occurrence calculation failed");
            Err(err)
        }
    }
}

/// Validates a loose pattern before computing its next occurrence.
pub fn next_occurrence_from_fields(
    fields: &PatternFields,
    from: NaiveDate,
    policy: OccurrencePolicy,
) -> Result<Option<NaiveDate>, OccurrenceError> {
    let pattern = RecurrencePattern::try_from(fields.clone()).map_err(|err| {
        warn!(pattern_type = %fields.pattern_type, error = %err, "rejected recurrence pattern");
        OccurrenceError::from(err)
    })?;
    next_occurrence_with(&pattern, from, policy)
}

/// All occurrences inside `[start, end]`, found by stepping the calculator.
///
/// When a step does not move forward (the legacy annual rule) the cursor
/// jumps to the first day of the following month. Custom patterns are
/// expanded by anchor month instead. Expansion stops after
/// `MAX_EXPANSION_STEPS` calculator steps; a truncated result is logged.
pub fn occurrences_between(
    pattern: &RecurrencePattern,
    start: NaiveDate,
    end: NaiveDate,
    policy: OccurrencePolicy,
) -> Result<Vec<NaiveDate>, OccurrenceError> {
    let mut occurrences = Vec::new();
    if start > end {
        return Ok(occurrences);
    }
    if let RecurrenceRule::Custom { offset_days } = pattern.rule {
        return custom_occurrences(pattern, offset_days, start, end);
    }
    let mut cursor = start.pred_opt().ok_or(OccurrenceError::OutOfRange)?;
    for _ in 0..MAX_EXPANSION_STEPS {
        let Some(next) = next_occurrence_with(pattern, cursor, policy)? else {
            return Ok(occurrences);
        };
        if next <= cursor {
            cursor = first_of_next_month(cursor)?;
            if cursor > end {
                return Ok(occurrences);
            }
            continue;
        }
        if next > end {
            return Ok(occurrences);
        }
        occurrences.push(next);
        cursor = next;
    }
    warn_truncated(pattern, start, end, occurrences.len());
    Ok(occurrences)
}

/// Walks every month whose end, shifted by `offset_days`, lands in `[start, end]`.
fn custom_occurrences(
    pattern: &RecurrencePattern,
    offset_days: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>, OccurrenceError> {
    pattern.rule.check()?;
    let back = offset_days.checked_neg().ok_or(OccurrenceError::OutOfRange)?;
    let first_anchor = add_days(start, back)?;
    let last_anchor = add_days(end, back)?;
    let mut month_end = last_day_of_month(first_anchor.year(), first_anchor.month())?;
    let mut occurrences = Vec::new();
    for _ in 0..MAX_EXPANSION_STEPS {
        if month_end > last_anchor {
            return Ok(occurrences);
        }
        let date = add_days(month_end, offset_days)?;
        if pattern.end_date.is_some_and(|until| date > until) {
            return Ok(occurrences);
        }
        occurrences.push(date);
        let next = first_of_next_month(month_end)?;
        month_end = last_day_of_month(next.year(), next.month())?;
    }
    warn_truncated(pattern, start, end, occurrences.len());
    Ok(occurrences)
}

fn warn_truncated(pattern: &RecurrencePattern, start: NaiveDate, end: NaiveDate, found: usize) {
    warn!(
        pattern = %pattern,
        %start,
        %end,
        found,
        max_steps = MAX_EXPANSION_STEPS,
        "occurrence expansion hit the step limit; later dates were dropped"
    );
}

fn compute(
    pattern: &RecurrencePattern,
    from: NaiveDate,
    policy: OccurrencePolicy,
) -> Result<NaiveDate, OccurrenceError> {
    pattern.rule.check()?;
    match &pattern.rule {
        RecurrenceRule::Daily { interval } => add_days(from, i64::from(*interval)),
        RecurrenceRule::Weekly { interval, weekdays } => next_weekly(from, *interval, weekdays),
        RecurrenceRule::Monthly {
            interval,
            day_of_month,
        } => {
            let (year, month) = shift_month(from.year(), from.month0(), i64::from(*interval))?;
            resolve_day(year, month, *day_of_month, policy.day_overflow)
        }
        RecurrenceRule::Quarterly { day_of_month } => {
            let next_block = (from.month0() / 3 + 1) * 3;
            let (year, month) = shift_month(from.year(), next_block, 0)?;
            resolve_day(year, month, *day_of_month, policy.day_overflow)
        }
        RecurrenceRule::Annually {
            month_of_year,
            day_of_month,
        } => next_annual(from, *month_of_year, *day_of_month, policy),
        RecurrenceRule::Custom { offset_days } => {
            let month_end = last_day_of_month(from.year(), from.month())?;
            add_days(month_end, *offset_days)
        }
    }
}

fn next_weekly(
    from: NaiveDate,
    interval: u32,
    weekdays: &[Weekday],
) -> Result<NaiveDate, OccurrenceError> {
    let today = i64::from(from.weekday().num_days_from_sunday());
    let days: Vec<i64> = weekdays
        .iter()
        .map(|wd| i64::from(wd.num_days_from_sunday()))
        .collect();
    if let Some(later_this_week) = days.iter().copied().filter(|d| *d > today).min() {
        return add_days(from, later_this_week - today);
    }
    let first = days
        .iter()
        .copied()
        .min()
        .ok_or(PatternError::EmptyWeekdays)?;
    // Sunday that starts the week `interval` weeks ahead, then the first selected day.
    add_days(from, 7 * i64::from(interval) - today + first)
}

fn next_annual(
    from: NaiveDate,
    month_of_year: u32,
    day_of_month: u32,
    policy: OccurrencePolicy,
) -> Result<NaiveDate, OccurrenceError> {
    match policy.annual_rule {
        AnnualRule::Legacy => {
            let year = if from.month0() >= month_of_year {
                from.year() + 1
            } else {
                from.year()
            };
            let date = resolve_day(year, month_of_year, day_of_month, policy.day_overflow)?;
            if date <= from {
                warn!(
                    %from,
                    %date,
                    month_of_year,
                    "legacy annual rule produced a date on or before the reference date"
                );
            }
            Ok(date)
        }
        AnnualRule::NextAfter => {
            let this_year = resolve_day(from.year(), month_of_year, day_of_month, policy.day_overflow)?;
            if this_year > from {
                return Ok(this_year);
            }
            resolve_day(from.year() + 1, month_of_year, day_of_month, policy.day_overflow)
        }
    }
}

fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate, OccurrenceError> {
    TimeDelta::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or(OccurrenceError::OutOfRange)
}

/// Returns (year, one-based month) `months` after the zero-based `month0`.
fn shift_month(year: i32, month0: u32, months: i64) -> Result<(i32, u32), OccurrenceError> {
    let total = i64::from(year) * 12 + i64::from(month0) + months;
    let year = i32::try_from(total.div_euclid(12)).map_err(|_| OccurrenceError::OutOfRange)?;
    let month = u32::try_from(total.rem_euclid(12) + 1).map_err(|_| OccurrenceError::OutOfRange)?;
    Ok((year, month))
}

fn resolve_day(
    year: i32,
    month: u32,
    day: u32,
    overflow: DayOverflow,
) -> Result<NaiveDate, OccurrenceError> {
    if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
        return Ok(date);
    }
    match overflow {
        DayOverflow::RollOver => {
            let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(OccurrenceError::OutOfRange)?;
            add_days(first, i64::from(day) - 1)
        }
        DayOverflow::Clamp => last_day_of_month(year, month),
        DayOverflow::Reject => Err(OccurrenceError::NonexistentDate { year, month, day }),
    }
}

pub(crate) fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate, OccurrenceError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .ok_or(OccurrenceError::OutOfRange)
}

fn first_of_next_month(date: NaiveDate) -> Result<NaiveDate, OccurrenceError> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .ok_or(OccurrenceError::OutOfRange)
}
