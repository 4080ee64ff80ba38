use super::next_occurrence::{OccurrencePolicy, occurrences_between};
use crate::skill_cache::{SkillMappingCache, SkillSource};
use crate::task::RecurringTask;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DemandError {
    #[error("range start {start} must be on or before range end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// Calendar month, rendered `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("invalid month '{s}' (expected YYYY-MM)"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{s}'"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{s}'"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in '{s}'"))
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDemand {
    pub skill: String,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMonthlyDemand {
    pub skill: String,
    pub month: YearMonth,
    pub hours: f64,
}

/// Skill-by-month hours for one forecast window.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandMatrix {
    skills: Vec<String>,
    months: Vec<YearMonth>,
    cells: HashMap<(usize, YearMonth), f64>,
}

impl DemandMatrix {
    fn empty(start: NaiveDate, end: NaiveDate) -> Self {
        let last = YearMonth::of(end);
        let mut months = Vec::new();
        let mut current = YearMonth::of(start);
        while current <= last {
            months.push(current);
            current = current.succ();
        }
        Self {
            skills: Vec::new(),
            months,
            cells: HashMap::new(),
        }
    }

    fn add(&mut self, skill_idx: usize, month: YearMonth, hours: f64) {
        *self.cells.entry((skill_idx, month)).or_insert(0.0) += hours;
    }

    /// Skills in the order they were first encountered.
    pub fn skills(&self) -> &[String] {
        &self.skills
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn hours(&self, skill: &str, month: YearMonth) -> f64 {
        self.skills
            .iter()
            .position(|s| s == skill)
            .and_then(|idx| self.cells.get(&(idx, month)).copied())
            .unwrap_or(0.0)
    }

    pub fn skill_total(&self, skill: &str) -> f64 {
        self.months.iter().map(|month| self.hours(skill, *month)).sum()
    }

    pub fn skill_totals(&self) -> Vec<SkillDemand> {
        self.skills
            .iter()
            .enumerate()
            .map(|(idx, skill)| SkillDemand {
                skill: skill.clone(),
                hours: self.row_total(idx),
            })
            .collect()
    }

    pub fn total_hours(&self) -> f64 {
        self.cells.values().sum()
    }

    /// Non-empty cells, skills in encounter order, months ascending.
    pub fn rows(&self) -> Vec<SkillMonthlyDemand> {
        let mut rows = Vec::new();
        for (idx, skill) in self.skills.iter().enumerate() {
            for month in &self.months {
                if let Some(hours) = self.cells.get(&(idx, *month)) {
                    rows.push(SkillMonthlyDemand {
                        skill: skill.clone(),
                        month: *month,
                        hours: *hours,
                    });
                }
            }
        }
        rows
    }

    fn row_total(&self, idx: usize) -> f64 {
        self.months
            .iter()
            .filter_map(|month| self.cells.get(&(idx, *month)))
            .sum()
    }

    /// One row per skill, one `YYYY-MM` column per month, plus `total`.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.months.len() + 2);
        let names: Vec<&str> = self.skills.iter().map(String::as_str).collect();
        columns.push(Series::new(PlSmallStr::from_static("skill"), names).into_column());
        for month in &self.months {
            let values: Vec<f64> = (0..self.skills.len())
                .map(|idx| self.cells.get(&(idx, *month)).copied().unwrap_or(0.0))
                .collect();
            columns.push(Series::new(month.to_string().into(), values).into_column());
        }
        let totals: Vec<f64> = (0..self.skills.len()).map(|idx| self.row_total(idx)).collect();
        columns.push(Series::new(PlSmallStr::from_static("total"), totals).into_column());
        DataFrame::new(columns)
    }
}

pub fn calculate_monthly_demand_by_skill(
    tasks: &[RecurringTask],
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> Result<Vec<SkillDemand>, DemandError> {
    build_demand_matrix(tasks, range_start, range_end, OccurrencePolicy::default())
        .map(|matrix| matrix.skill_totals())
}

pub fn build_demand_matrix(
    tasks: &[RecurringTask],
    range_start: NaiveDate,
    range_end: NaiveDate,
    policy: OccurrencePolicy,
) -> Result<DemandMatrix, DemandError> {
    aggregate(tasks, range_start, range_end, policy, |skill| skill)
}

fn aggregate<'t, F>(
    tasks: &'t [RecurringTask],
    range_start: NaiveDate,
    range_end: NaiveDate,
    policy: OccurrencePolicy,
    resolve: F,
) -> Result<DemandMatrix, DemandError>
where
    F: Fn(&'t str) -> &'t str,
{
    if range_start > range_end {
        return Err(DemandError::InvalidRange {
            start: range_start,
            end: range_end,
        });
    }

    // Expansion is independent per task; collect keeps task order.
    let expanded: Vec<(&RecurringTask, Vec<NaiveDate>)> = tasks
        .par_iter()
        .filter(|task| task.is_active)
        .filter_map(|task| {
            match occurrences_between(&task.recurrence_pattern, range_start, range_end, policy) {
                Ok(dates) => Some((task, dates)),
                Err(err) => {
                    warn!(task_id = %task.id, error = %err, "skipping task in demand aggregation");
                    None
                }
            }
        })
        .collect();

    let mut matrix = DemandMatrix::empty(range_start, range_end);
    let mut skill_index: HashMap<&str, usize> = HashMap::new();
    for (task, dates) in expanded {
        if dates.is_empty() {
            continue;
        }
        if task.required_skills.is_empty() {
            debug!(task_id = %task.id, "task has no required skills; hours not attributed");
            continue;
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for raw in &task.required_skills {
            let skill = resolve(raw.as_str());
            if !seen.insert(skill) {
                continue;
            }
            let idx = *skill_index.entry(skill).or_insert_with(|| {
                matrix.skills.push(skill.to_string());
                matrix.skills.len() - 1
            });
            for date in &dates {
                matrix.add(idx, YearMonth::of(*date), task.estimated_hours);
            }
        }
    }
    debug!(
        skills = matrix.skills.len(),
        total_hours = matrix.total_hours(),
        "demand matrix aggregated"
    );
    Ok(matrix)
}

/// Aggregator that resolves skill references through an owned cache.
pub struct DemandForecaster<S> {
    source: S,
    cache: SkillMappingCache,
    policy: OccurrencePolicy,
}

impl<S: SkillSource> DemandForecaster<S> {
    pub fn new(source: S, cache_ttl: Duration) -> Self {
        Self {
            source,
            cache: SkillMappingCache::new(cache_ttl),
            policy: OccurrencePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OccurrencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache(&self) -> &SkillMappingCache {
        &self.cache
    }

    pub fn invalidate_skills(&mut self) {
        self.cache.invalidate();
    }

    pub fn refresh_skills(&mut self) -> Result<usize, crate::skill_cache::SkillSourceError> {
        self.cache.refresh(&self.source)
    }

    pub fn demand_matrix(
        &mut self,
        tasks: &[RecurringTask],
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<DemandMatrix, DemandError> {
        if let Err(err) = self.cache.ensure_fresh(&self.source) {
            warn!(error = %err, "using previous skill mappings");
        }
        let cache = &self.cache;
        aggregate(tasks, range_start, range_end, self.policy, |skill| {
            cache.resolve(skill)
        })
    }

    pub fn monthly_demand_by_skill(
        &mut self,
        tasks: &[RecurringTask],
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<Vec<SkillDemand>, DemandError> {
        self.demand_matrix(tasks, range_start, range_end)
            .map(|matrix| matrix.skill_totals())
    }
}
