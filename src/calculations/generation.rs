use super::next_occurrence::{OccurrencePolicy, occurrences_between};
use super::BatchError;
use crate::persistence::TaskStore;
use crate::task::{RecurringTask, TaskInstance};
use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("from date {from} must be on or before to date {to}")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },
    #[error("lead time must be non-negative (got {0} days)")]
    NegativeLeadTime(i64),
    #[error("lead time of {0} days puts due dates out of range")]
    LeadTimeOutOfRange(i64),
    #[error("could not list recurring tasks: {0}")]
    Store(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub generated: Vec<TaskInstance>,
    /// Active tasks whose next occurrence fell outside the window.
    pub skipped: usize,
    pub errors: Vec<BatchError>,
}

impl GenerationReport {
    pub fn to_cli_summary(&self) -> String {
        let mut parts = vec![
            format!("generated={}", self.generated.len()),
            format!("skipped={}", self.skipped),
        ];
        if !self.errors.is_empty() {
            parts.push(format!("errors={}", self.errors.len()));
        }
        parts.join(", ")
    }
}

enum Outcome {
    Generated(TaskInstance),
    OutsideWindow,
}

/// Materialises one instance per active recurring task whose next occurrence,
/// less `lead_time_days`, lands inside `[from, to]`.
///
/// Occurrences are stepped forward from the task's `last_generated_date`, so a
/// due date at or before it is never produced again and a task left behind by
/// earlier windows catches up to the first occurrence due in this one.
///
/// The range is checked before the store is touched. Failures on individual
/// tasks are recorded in the report and do not stop the batch; writes already
/// made are not rolled back.
pub fn generate_task_instances<S: TaskStore + ?Sized>(
    store: &S,
    from: NaiveDate,
    to: NaiveDate,
    lead_time_days: i64,
    policy: OccurrencePolicy,
) -> Result<GenerationReport, GenerationError> {
    if from > to {
        return Err(GenerationError::InvalidDateRange { from, to });
    }
    if lead_time_days < 0 {
        return Err(GenerationError::NegativeLeadTime(lead_time_days));
    }
    let lead = TimeDelta::try_days(lead_time_days)
        .ok_or(GenerationError::LeadTimeOutOfRange(lead_time_days))?;
    let shift = |date: NaiveDate| {
        date.checked_add_signed(lead)
            .ok_or(GenerationError::LeadTimeOutOfRange(lead_time_days))
    };
    let window = DueWindow {
        earliest: shift(from)?,
        latest: shift(to)?,
    };

    let tasks = store
        .recurring_tasks()
        .map_err(|err| GenerationError::Store(err.to_string()))?;

    let mut report = GenerationReport::default();
    for task in tasks.into_iter().filter(|task| task.is_active) {
        let task_id = task.id;
        match generate_for_task(store, task, from, window, policy) {
            Ok(Outcome::Generated(instance)) => report.generated.push(instance),
            Ok(Outcome::OutsideWindow) => report.skipped += 1,
            Err(message) => {
                warn!(%task_id, error = %message, "task instance generation failed");
                report.errors.push(BatchError::recurring(task_id, message));
            }
        }
    }
    info!(
        %from,
        %to,
        lead_time_days,
        generated = report.generated.len(),
        errors = report.errors.len(),
        "task instance generation finished"
    );
    Ok(report)
}

/// Due dates whose trigger date falls inside the generation window.
#[derive(Clone, Copy)]
struct DueWindow {
    earliest: NaiveDate,
    latest: NaiveDate,
}

fn generate_for_task<S: TaskStore + ?Sized>(
    store: &S,
    mut task: RecurringTask,
    from: NaiveDate,
    window: DueWindow,
    policy: OccurrencePolicy,
) -> Result<Outcome, String> {
    let reference = match task.last_generated_date {
        Some(last) => last,
        None => from.pred_opt().ok_or("date out of range")?,
    };
    let first_candidate = reference.succ_opt().ok_or("date out of range")?;
    let due = occurrences_between(&task.recurrence_pattern, first_candidate, window.latest, policy)
        .map_err(|err| err.to_string())?
        .into_iter()
        .find(|due| *due >= window.earliest);
    let Some(due) = due else {
        debug!(task_id = %task.id, %reference, "no occurrence due inside generation window");
        return Ok(Outcome::OutsideWindow);
    };

    let instance = store
        .insert_task_instance(task.instantiate(due))
        .map_err(|err| err.to_string())?;
    task.last_generated_date = Some(due);
    task.touch();
    store
        .update_recurring_task(&task)
        .map_err(|err| format!("instance {} created but task not updated: {err}", instance.id))?;
    debug!(task_id = %task.id, instance_id = %instance.id, %due, "generated task instance");
    Ok(Outcome::Generated(instance))
}

/// Instances previously generated from `recurring_task_id`.
pub fn instances_for_task<S: TaskStore + ?Sized>(
    store: &S,
    recurring_task_id: Uuid,
) -> Result<Vec<TaskInstance>, GenerationError> {
    let instances = store
        .task_instances()
        .map_err(|err| GenerationError::Store(err.to_string()))?;
    Ok(instances
        .into_iter()
        .filter(|instance| instance.recurring_task_id == Some(recurring_task_id))
        .collect())
}
