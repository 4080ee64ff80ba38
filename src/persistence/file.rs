use super::{InMemoryTaskStore, PersistenceError, PersistenceResult, TaskStore};
use crate::recurrence::{PatternFields, RecurrencePattern};
use crate::task::{Priority, RecurringTask, TaskInstance};
use crate::task_validation::SKILL_SEPARATOR;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot {
    recurring_tasks: Vec<RecurringTask>,
    #[serde(default)]
    task_instances: Vec<TaskInstance>,
}

pub fn save_store_to_json<S, P>(store: &S, path: P) -> PersistenceResult<()>
where
    S: TaskStore + ?Sized,
    P: AsRef<Path>,
{
    let snapshot = StoreSnapshot {
        recurring_tasks: store.recurring_tasks()?,
        task_instances: store.task_instances()?,
    };
    super::validate_recurring_tasks(&snapshot.recurring_tasks)?;
    super::validate_task_instances(&snapshot.task_instances)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    Ok(())
}

pub fn load_store_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<InMemoryTaskStore> {
    let file = File::open(path)?;
    let snapshot: StoreSnapshot = serde_json::from_reader(file)?;
    InMemoryTaskStore::from_parts(snapshot.recurring_tasks, snapshot.task_instances)
}

/// Flat CSV row; storage columns are snake_case.
#[derive(Default, Serialize, Deserialize)]
struct RecurringTaskCsvRecord {
    id: String,
    template_id: String,
    client_id: String,
    name: String,
    description: String,
    estimated_hours: f64,
    required_skills: String,
    priority: String,
    category: String,
    recurrence_pattern: String,
    is_active: String,
    last_generated_date: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
}

impl TryFrom<&RecurringTask> for RecurringTaskCsvRecord {
    type Error = PersistenceError;

    fn try_from(task: &RecurringTask) -> Result<Self, Self::Error> {
        Ok(Self {
            id: task.id.to_string(),
            template_id: task.template_id.to_string(),
            client_id: task.client_id.to_string(),
            name: task.name.clone(),
            description: task.description.clone().unwrap_or_default(),
            estimated_hours: task.estimated_hours,
            required_skills: task.required_skills.join(SKILL_SEPARATOR),
            priority: task.priority.as_str().to_string(),
            category: task.category.clone().unwrap_or_default(),
            recurrence_pattern: serde_json::to_string(&task.recurrence_pattern.to_fields())?,
            is_active: task.is_active.to_string(),
            last_generated_date: format_date(task.last_generated_date),
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        })
    }
}

impl RecurringTaskCsvRecord {
    fn into_task(self) -> PersistenceResult<RecurringTask> {
        let fields: PatternFields = serde_json::from_str(&self.recurrence_pattern).map_err(|err| {
            PersistenceError::InvalidData(format!("invalid recurrence_pattern: {err}"))
        })?;
        let pattern = RecurrencePattern::try_from(fields).map_err(|err| {
            PersistenceError::InvalidData(format!("task '{}': {err}", self.name))
        })?;
        let now = Utc::now();
        Ok(RecurringTask {
            id: parse_uuid(&self.id)?.unwrap_or_else(Uuid::new_v4),
            template_id: parse_uuid(&self.template_id)?.unwrap_or_else(Uuid::nil),
            client_id: parse_uuid(&self.client_id)?.ok_or_else(|| {
                PersistenceError::InvalidData(format!("task '{}' has no client_id", self.name))
            })?,
            name: self.name,
            description: parse_string_option(self.description),
            estimated_hours: self.estimated_hours,
            required_skills: split_strings(&self.required_skills),
            priority: if self.priority.trim().is_empty() {
                Priority::default()
            } else {
                Priority::from_str(&self.priority).map_err(PersistenceError::InvalidData)?
            },
            category: parse_string_option(self.category),
            recurrence_pattern: pattern,
            is_active: parse_bool(&self.is_active)?.unwrap_or(true),
            last_generated_date: parse_date(&self.last_generated_date)?,
            created_at: parse_timestamp(&self.created_at)?.unwrap_or(now),
            updated_at: parse_timestamp(&self.updated_at)?.unwrap_or(now),
        })
    }
}

pub fn save_recurring_tasks_to_csv<P: AsRef<Path>>(
    tasks: &[RecurringTask],
    path: P,
) -> PersistenceResult<()> {
    super::validate_recurring_tasks(tasks)?;
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for task in tasks {
        writer.serialize(RecurringTaskCsvRecord::try_from(task)?)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_recurring_tasks_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<RecurringTask>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut tasks = Vec::new();
    for record in reader.deserialize::<RecurringTaskCsvRecord>() {
        tasks.push(record?.into_task()?);
    }
    super::validate_recurring_tasks(&tasks)?;
    Ok(tasks)
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn parse_date(input: &str) -> PersistenceResult<Option<NaiveDate>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

fn parse_timestamp(input: &str) -> PersistenceResult<Option<DateTime<Utc>>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(input.trim())
        .map(|ts| Some(ts.with_timezone(&Utc)))
        .map_err(|e| PersistenceError::InvalidData(format!("invalid timestamp '{input}': {e}")))
}

fn parse_uuid(input: &str) -> PersistenceResult<Option<Uuid>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(input.trim())
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid id '{input}': {e}")))
}

fn parse_bool(input: &str) -> PersistenceResult<Option<bool>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    match input.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(Some(true)),
        "false" => Ok(Some(false)),
        other => Err(PersistenceError::InvalidData(format!(
            "invalid boolean '{other}'"
        ))),
    }
}

fn split_strings(input: &str) -> Vec<String> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    input.split(SKILL_SEPARATOR).map(|s| s.trim().to_string()).collect()
}

fn parse_string_option(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
