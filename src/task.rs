use crate::recurrence::RecurrencePattern;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Unscheduled,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Unscheduled => "Unscheduled",
            TaskStatus::Scheduled => "Scheduled",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "").as_str() {
            "unscheduled" => Ok(TaskStatus::Unscheduled),
            "scheduled" => Ok(TaskStatus::Scheduled),
            "inprogress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" | "canceled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// Template-driven task definition that spawns periodic [`TaskInstance`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTask {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub template_id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hours per occurrence. Must be positive.
    pub estimated_hours: f64,
    /// Skill labels; order is preserved and duplicates are ignored by the aggregator.
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub recurrence_pattern: RecurrencePattern,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_generated_date: Option<NaiveDate>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl RecurringTask {
    pub fn new(
        client_id: Uuid,
        name: impl Into<String>,
        estimated_hours: f64,
        recurrence_pattern: RecurrencePattern,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            template_id: Uuid::nil(),
            client_id,
            name: name.into(),
            description: None,
            estimated_hours,
            required_skills: Vec::new(),
            priority: Priority::default(),
            category: None,
            recurrence_pattern,
            is_active: true,
            last_generated_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_template(mut self, template_id: Uuid) -> Self {
        self.template_id = template_id;
        self
    }

    /// Soft delete.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Builds the concrete instance due on `due_date`.
    pub fn instantiate(&self, due_date: NaiveDate) -> TaskInstance {
        let mut instance = TaskInstance::new(self.client_id, self.name.clone(), due_date);
        instance.recurring_task_id = Some(self.id);
        instance.template_id = Some(self.template_id);
        instance.description = self.description.clone();
        instance.estimated_hours = self.estimated_hours;
        instance.required_skills = self.required_skills.clone();
        instance.priority = self.priority;
        instance.category = self.category.clone();
        instance
    }

    /// Copy for another client with a fresh identity and generation history.
    pub fn copy_for_client(&self, client_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id,
            last_generated_date: None,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// One concrete, schedulable occurrence of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_task_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Uuid>,
    pub client_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_staff_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TaskInstance {
    pub fn new(client_id: Uuid, name: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            recurring_task_id: None,
            template_id: None,
            client_id,
            name: name.into(),
            description: None,
            due_date,
            estimated_hours: 0.0,
            required_skills: Vec::new(),
            priority: Priority::default(),
            category: None,
            status: TaskStatus::Unscheduled,
            assigned_staff_id: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_ad_hoc(&self) -> bool {
        self.recurring_task_id.is_none()
    }

    /// Copy for another client; the copy starts unscheduled and unassigned.
    pub fn copy_for_client(&self, client_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            status: TaskStatus::Unscheduled,
            assigned_staff_id: None,
            created_at: Utc::now(),
            ..self.clone()
        }
    }
}
