use crate::task::{RecurringTask, TaskInstance};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TaskValidationError {
    message: String,
}

impl TaskValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn check_hours(id: impl std::fmt::Display, hours: f64, allow_zero: bool) -> Result<(), TaskValidationError> {
    let ok = hours.is_finite() && (hours > 0.0 || (allow_zero && hours == 0.0));
    if !ok {
        return Err(TaskValidationError::new(format!(
            "task {id} has invalid estimated_hours {hours}"
        )));
    }
    Ok(())
}

/// Separates skills in the CSV `required_skills` column.
pub(crate) const SKILL_SEPARATOR: &str = ";";

fn check_skills(id: impl std::fmt::Display, skills: &[String]) -> Result<(), TaskValidationError> {
    if let Some(idx) = skills.iter().position(|s| s.trim().is_empty()) {
        return Err(TaskValidationError::new(format!(
            "task {id} required skill #{idx} is empty"
        )));
    }
    if let Some(skill) = skills.iter().find(|s| s.contains(SKILL_SEPARATOR)) {
        return Err(TaskValidationError::new(format!(
            "task {id} required skill '{skill}' contains '{SKILL_SEPARATOR}'"
        )));
    }
    Ok(())
}

pub fn validate_recurring_task(task: &RecurringTask) -> Result<(), TaskValidationError> {
    if task.name.trim().is_empty() {
        return Err(TaskValidationError::new(format!(
            "task {} requires a non-empty name",
            task.id
        )));
    }
    check_hours(task.id, task.estimated_hours, false)?;
    check_skills(task.id, &task.required_skills)?;
    task.recurrence_pattern.rule.check().map_err(|err| {
        TaskValidationError::new(format!("task {} has invalid recurrence pattern: {err}", task.id))
    })?;
    Ok(())
}

pub fn validate_task_instance(instance: &TaskInstance) -> Result<(), TaskValidationError> {
    if instance.name.trim().is_empty() {
        return Err(TaskValidationError::new(format!(
            "task instance {} requires a non-empty name",
            instance.id
        )));
    }
    check_hours(instance.id, instance.estimated_hours, true)?;
    check_skills(instance.id, &instance.required_skills)?;
    Ok(())
}

pub fn validate_recurring_collection(tasks: &[RecurringTask]) -> Result<(), TaskValidationError> {
    let mut seen_ids = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen_ids.insert(task.id) {
            return Err(TaskValidationError::new(format!(
                "duplicate recurring task id {}",
                task.id
            )));
        }
        validate_recurring_task(task)?;
    }
    Ok(())
}

pub fn validate_instance_collection(instances: &[TaskInstance]) -> Result<(), TaskValidationError> {
    let mut seen_ids = HashSet::with_capacity(instances.len());
    for instance in instances {
        if !seen_ids.insert(instance.id) {
            return Err(TaskValidationError::new(format!(
                "duplicate task instance id {}",
                instance.id
            )));
        }
        validate_task_instance(instance)?;
    }
    Ok(())
}
