//! Recurrence patterns.
//!
//! Patterns arrive from the outside world in a loose shape ([`PatternFields`]):
//! a `type` string plus optional fields. [`RecurrencePattern`] is the checked
//! form; every variant of [`RecurrenceRule`] carries exactly the fields its
//! type needs, so a value of that type is always complete.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annually,
    Custom,
}

impl RecurrenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceKind::Daily => "Daily",
            RecurrenceKind::Weekly => "Weekly",
            RecurrenceKind::Monthly => "Monthly",
            RecurrenceKind::Quarterly => "Quarterly",
            RecurrenceKind::Annually => "Annually",
            RecurrenceKind::Custom => "Custom",
        }
    }
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceKind {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(RecurrenceKind::Daily),
            "weekly" => Ok(RecurrenceKind::Weekly),
            "monthly" => Ok(RecurrenceKind::Monthly),
            "quarterly" => Ok(RecurrenceKind::Quarterly),
            "annually" | "annual" => Ok(RecurrenceKind::Annually),
            "custom" => Ok(RecurrenceKind::Custom),
            _ => Err(PatternError::UnknownType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("unknown recurrence type '{0}'")]
    UnknownType(String),
    #[error("{kind} pattern requires {field}")]
    MissingField {
        kind: RecurrenceKind,
        field: &'static str,
    },
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("weekly pattern requires at least one weekday")]
    EmptyWeekdays,
}

/// Loose pattern shape as stored and exchanged (camelCase JSON).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternFields {
    #[serde(rename = "type")]
    pub pattern_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    /// 0 = Sunday through 6 = Saturday.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_of_year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_offset_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl PatternFields {
    pub fn new(pattern_type: impl Into<String>) -> Self {
        Self {
            pattern_type: pattern_type.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceRule {
    Daily { interval: u32 },
    /// `weekdays` is kept sorted Sunday-first without duplicates.
    Weekly { interval: u32, weekdays: Vec<Weekday> },
    Monthly { interval: u32, day_of_month: u32 },
    Quarterly { day_of_month: u32 },
    Annually { month_of_year: u32, day_of_month: u32 },
    Custom { offset_days: i64 },
}

impl RecurrenceRule {
    pub fn kind(&self) -> RecurrenceKind {
        match self {
            RecurrenceRule::Daily { .. } => RecurrenceKind::Daily,
            RecurrenceRule::Weekly { .. } => RecurrenceKind::Weekly,
            RecurrenceRule::Monthly { .. } => RecurrenceKind::Monthly,
            RecurrenceRule::Quarterly { .. } => RecurrenceKind::Quarterly,
            RecurrenceRule::Annually { .. } => RecurrenceKind::Annually,
            RecurrenceRule::Custom { .. } => RecurrenceKind::Custom,
        }
    }

    /// Range checks for rules built directly instead of through [`PatternFields`].
    pub fn check(&self) -> Result<(), PatternError> {
        match self {
            RecurrenceRule::Daily { interval } => check_interval(*interval),
            RecurrenceRule::Weekly { interval, weekdays } => {
                check_interval(*interval)?;
                if weekdays.is_empty() {
                    return Err(PatternError::EmptyWeekdays);
                }
                Ok(())
            }
            RecurrenceRule::Monthly {
                interval,
                day_of_month,
            } => {
                check_interval(*interval)?;
                check_day_of_month(*day_of_month)
            }
            RecurrenceRule::Quarterly { day_of_month } => check_day_of_month(*day_of_month),
            RecurrenceRule::Annually {
                month_of_year,
                day_of_month,
            } => {
                if !(1..=12).contains(month_of_year) {
                    return Err(PatternError::OutOfRange {
                        field: "monthOfYear",
                        value: i64::from(*month_of_year),
                    });
                }
                check_day_of_month(*day_of_month)
            }
            RecurrenceRule::Custom { .. } => Ok(()),
        }
    }
}

fn check_interval(interval: u32) -> Result<(), PatternError> {
    if interval == 0 {
        return Err(PatternError::OutOfRange {
            field: "interval",
            value: 0,
        });
    }
    Ok(())
}

fn check_day_of_month(day: u32) -> Result<(), PatternError> {
    if !(1..=31).contains(&day) {
        return Err(PatternError::OutOfRange {
            field: "dayOfMonth",
            value: i64::from(day),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PatternFields", into = "PatternFields")]
pub struct RecurrencePattern {
    pub rule: RecurrenceRule,
    pub end_date: Option<NaiveDate>,
}

impl RecurrencePattern {
    pub fn new(rule: RecurrenceRule) -> Result<Self, PatternError> {
        rule.check()?;
        let rule = match rule {
            RecurrenceRule::Weekly { interval, weekdays } => RecurrenceRule::Weekly {
                interval,
                weekdays: normalize_weekdays(weekdays),
            },
            other => other,
        };
        Ok(Self {
            rule,
            end_date: None,
        })
    }

    pub fn daily(interval: u32) -> Result<Self, PatternError> {
        Self::new(RecurrenceRule::Daily { interval })
    }

    pub fn weekly(interval: u32, weekdays: Vec<Weekday>) -> Result<Self, PatternError> {
        Self::new(RecurrenceRule::Weekly { interval, weekdays })
    }

    pub fn monthly(interval: u32, day_of_month: u32) -> Result<Self, PatternError> {
        Self::new(RecurrenceRule::Monthly {
            interval,
            day_of_month,
        })
    }

    pub fn quarterly(day_of_month: u32) -> Result<Self, PatternError> {
        Self::new(RecurrenceRule::Quarterly { day_of_month })
    }

    pub fn annually(month_of_year: u32, day_of_month: u32) -> Result<Self, PatternError> {
        Self::new(RecurrenceRule::Annually {
            month_of_year,
            day_of_month,
        })
    }

    pub fn custom(offset_days: i64) -> Result<Self, PatternError> {
        Self::new(RecurrenceRule::Custom { offset_days })
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn kind(&self) -> RecurrenceKind {
        self.rule.kind()
    }

    pub fn to_fields(&self) -> PatternFields {
        PatternFields::from(self.clone())
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            RecurrenceRule::Daily { interval } => write!(f, "every {interval} day(s)"),
            RecurrenceRule::Weekly { interval, weekdays } => {
                let days = weekdays
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "every {interval} week(s) on {days}")
            }
            RecurrenceRule::Monthly {
                interval,
                day_of_month,
            } => write!(f, "every {interval} month(s) on day {day_of_month}"),
            RecurrenceRule::Quarterly { day_of_month } => {
                write!(f, "quarterly on day {day_of_month}")
            }
            RecurrenceRule::Annually {
                month_of_year,
                day_of_month,
            } => write!(f, "annually on {month_of_year}/{day_of_month}"),
            RecurrenceRule::Custom { offset_days } => {
                write!(f, "month end {offset_days:+} day(s)")
            }
        }?;
        if let Some(end) = self.end_date {
            write!(f, " until {end}")?;
        }
        Ok(())
    }
}

/// 0 = Sunday, matching the wire numbering.
pub fn weekday_from_index(index: i64) -> Result<Weekday, PatternError> {
    match index {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(PatternError::OutOfRange {
            field: "weekdays",
            value: other,
        }),
    }
}

pub fn weekday_index(weekday: Weekday) -> i64 {
    i64::from(weekday.num_days_from_sunday())
}

fn normalize_weekdays(mut weekdays: Vec<Weekday>) -> Vec<Weekday> {
    weekdays.sort_by_key(|wd| wd.num_days_from_sunday());
    weekdays.dedup();
    weekdays
}

fn required(
    value: Option<i64>,
    kind: RecurrenceKind,
    field: &'static str,
) -> Result<i64, PatternError> {
    value.ok_or(PatternError::MissingField { kind, field })
}

fn positive_interval(value: Option<i64>, kind: RecurrenceKind) -> Result<u32, PatternError> {
    let interval = required(value, kind, "interval")?;
    u32::try_from(interval)
        .ok()
        .filter(|v| *v > 0)
        .ok_or(PatternError::OutOfRange {
            field: "interval",
            value: interval,
        })
}

fn ranged(
    value: Option<i64>,
    kind: RecurrenceKind,
    field: &'static str,
    max: i64,
) -> Result<u32, PatternError> {
    let raw = required(value, kind, field)?;
    if !(1..=max).contains(&raw) {
        return Err(PatternError::OutOfRange { field, value: raw });
    }
    u32::try_from(raw).map_err(|_| PatternError::OutOfRange { field, value: raw })
}

impl TryFrom<PatternFields> for RecurrencePattern {
    type Error = PatternError;

    fn try_from(fields: PatternFields) -> Result<Self, Self::Error> {
        let kind = RecurrenceKind::from_str(&fields.pattern_type)?;
        let rule = match kind {
            RecurrenceKind::Daily => RecurrenceRule::Daily {
                interval: positive_interval(fields.interval, kind)?,
            },
            RecurrenceKind::Weekly => {
                let interval = positive_interval(fields.interval, kind)?;
                let raw = fields.weekdays.ok_or(PatternError::MissingField {
                    kind,
                    field: "weekdays",
                })?;
                if raw.is_empty() {
                    return Err(PatternError::EmptyWeekdays);
                }
                let weekdays = raw
                    .into_iter()
                    .map(weekday_from_index)
                    .collect::<Result<Vec<_>, _>>()?;
                RecurrenceRule::Weekly { interval, weekdays }
            }
            RecurrenceKind::Monthly => RecurrenceRule::Monthly {
                interval: positive_interval(fields.interval, kind)?,
                day_of_month: ranged(fields.day_of_month, kind, "dayOfMonth", 31)?,
            },
            RecurrenceKind::Quarterly => RecurrenceRule::Quarterly {
                day_of_month: ranged(fields.day_of_month, kind, "dayOfMonth", 31)?,
            },
            RecurrenceKind::Annually => RecurrenceRule::Annually {
                month_of_year: ranged(fields.month_of_year, kind, "monthOfYear", 12)?,
                day_of_month: ranged(fields.day_of_month, kind, "dayOfMonth", 31)?,
            },
            RecurrenceKind::Custom => RecurrenceRule::Custom {
                offset_days: required(fields.custom_offset_days, kind, "customOffsetDays")?,
            },
        };
        let mut pattern = RecurrencePattern::new(rule)?;
        pattern.end_date = fields.end_date;
        Ok(pattern)
    }
}

impl From<RecurrencePattern> for PatternFields {
    fn from(pattern: RecurrencePattern) -> Self {
        let mut fields = PatternFields::new(pattern.kind().as_str());
        fields.end_date = pattern.end_date;
        match pattern.rule {
            RecurrenceRule::Daily { interval } => {
                fields.interval = Some(i64::from(interval));
            }
            RecurrenceRule::Weekly { interval, weekdays } => {
                fields.interval = Some(i64::from(interval));
                fields.weekdays = Some(weekdays.into_iter().map(weekday_index).collect());
            }
            RecurrenceRule::Monthly {
                interval,
                day_of_month,
            } => {
                fields.interval = Some(i64::from(interval));
                fields.day_of_month = Some(i64::from(day_of_month));
            }
            RecurrenceRule::Quarterly { day_of_month } => {
                fields.day_of_month = Some(i64::from(day_of_month));
            }
            RecurrenceRule::Annually {
                month_of_year,
                day_of_month,
            } => {
                fields.month_of_year = Some(i64::from(month_of_year));
                fields.day_of_month = Some(i64::from(day_of_month));
            }
            RecurrenceRule::Custom { offset_days } => {
                fields.custom_offset_days = Some(offset_days);
            }
        }
        fields
    }
}

/// True when `fields` describes a complete pattern for its type.
pub fn validate(fields: &PatternFields) -> bool {
    RecurrencePattern::try_from(fields.clone()).is_ok()
}
