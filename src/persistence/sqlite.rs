use super::{PersistenceError, PersistenceResult, TaskStore};
use crate::recurrence::{PatternFields, RecurrencePattern};
use crate::task::{Priority, RecurringTask, TaskInstance, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const RECURRING_COLUMNS: &str = "id, template_id, client_id, name, description, estimated_hours, \
     required_skills, priority, category, recurrence_pattern, is_active, last_generated_date, \
     created_at, updated_at";

const INSTANCE_COLUMNS: &str = "id, recurring_task_id, template_id, client_id, name, description, \
     due_date, estimated_hours, required_skills, priority, category, status, assigned_staff_id, \
     notes, created_at";

pub struct SqliteTaskStore {
    connection: Mutex<Connection>,
}

impl SqliteTaskStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS recurring_tasks (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                estimated_hours REAL NOT NULL,
                required_skills TEXT NOT NULL,
                priority TEXT NOT NULL,
                category TEXT,
                recurrence_pattern TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                last_generated_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS task_instances (
                id TEXT PRIMARY KEY,
                recurring_task_id TEXT,
                template_id TEXT,
                client_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                due_date TEXT NOT NULL,
                estimated_hours REAL NOT NULL,
                required_skills TEXT NOT NULL,
                priority TEXT NOT NULL,
                category TEXT,
                status TEXT NOT NULL,
                assigned_staff_id TEXT,
                notes TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_task_instances_recurring
                ON task_instances (recurring_task_id);
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| PersistenceError::LockPoisoned)
    }
}

struct RecurringRow {
    id: String,
    template_id: String,
    client_id: String,
    name: String,
    description: Option<String>,
    estimated_hours: f64,
    required_skills: String,
    priority: String,
    category: Option<String>,
    recurrence_pattern: String,
    is_active: bool,
    last_generated_date: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RecurringRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            template_id: row.get(1)?,
            client_id: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            estimated_hours: row.get(5)?,
            required_skills: row.get(6)?,
            priority: row.get(7)?,
            category: row.get(8)?,
            recurrence_pattern: row.get(9)?,
            is_active: row.get(10)?,
            last_generated_date: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_task(self) -> PersistenceResult<RecurringTask> {
        let fields: PatternFields = serde_json::from_str(&self.recurrence_pattern)?;
        let recurrence_pattern = RecurrencePattern::try_from(fields)
            .map_err(|err| PersistenceError::InvalidData(format!("task {}: {err}", self.id)))?;
        Ok(RecurringTask {
            id: parse_uuid(&self.id)?,
            template_id: parse_uuid(&self.template_id)?,
            client_id: parse_uuid(&self.client_id)?,
            name: self.name,
            description: self.description,
            estimated_hours: self.estimated_hours,
            required_skills: serde_json::from_str(&self.required_skills)?,
            priority: Priority::from_str(&self.priority).map_err(PersistenceError::InvalidData)?,
            category: self.category,
            recurrence_pattern,
            is_active: self.is_active,
            last_generated_date: self.last_generated_date.as_deref().map(parse_date).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct InstanceRow {
    id: String,
    recurring_task_id: Option<String>,
    template_id: Option<String>,
    client_id: String,
    name: String,
    description: Option<String>,
    due_date: String,
    estimated_hours: f64,
    required_skills: String,
    priority: String,
    category: Option<String>,
    status: String,
    assigned_staff_id: Option<String>,
    notes: Option<String>,
    created_at: String,
}

impl InstanceRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            recurring_task_id: row.get(1)?,
            template_id: row.get(2)?,
            client_id: row.get(3)?,
            name: row.get(4)?,
            description: row.get(5)?,
            due_date: row.get(6)?,
            estimated_hours: row.get(7)?,
            required_skills: row.get(8)?,
            priority: row.get(9)?,
            category: row.get(10)?,
            status: row.get(11)?,
            assigned_staff_id: row.get(12)?,
            notes: row.get(13)?,
            created_at: row.get(14)?,
        })
    }

    fn into_instance(self) -> PersistenceResult<TaskInstance> {
        Ok(TaskInstance {
            id: parse_uuid(&self.id)?,
            recurring_task_id: self.recurring_task_id.as_deref().map(parse_uuid).transpose()?,
            template_id: self.template_id.as_deref().map(parse_uuid).transpose()?,
            client_id: parse_uuid(&self.client_id)?,
            name: self.name,
            description: self.description,
            due_date: parse_date(&self.due_date)?,
            estimated_hours: self.estimated_hours,
            required_skills: serde_json::from_str(&self.required_skills)?,
            priority: Priority::from_str(&self.priority).map_err(PersistenceError::InvalidData)?,
            category: self.category,
            status: TaskStatus::from_str(&self.status).map_err(PersistenceError::InvalidData)?,
            assigned_staff_id: self.assigned_staff_id.as_deref().map(parse_uuid).transpose()?,
            notes: self.notes,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl TaskStore for SqliteTaskStore {
    fn recurring_tasks(&self) -> PersistenceResult<Vec<RecurringTask>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_tasks ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map([], RecurringRow::read)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }

    fn find_recurring_task(&self, id: Uuid) -> PersistenceResult<Option<RecurringTask>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_tasks WHERE id = ?1"
        ))?;
        let row = stmt
            .query_row(params![id.to_string()], RecurringRow::read)
            .optional()?;
        row.map(RecurringRow::into_task).transpose()
    }

    fn insert_recurring_task(&self, task: RecurringTask) -> PersistenceResult<RecurringTask> {
        super::validate_recurring_task(&task)?;
        let pattern = serde_json::to_string(&task.recurrence_pattern)?;
        let skills = serde_json::to_string(&task.required_skills)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO recurring_tasks ({RECURRING_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                task.id.to_string(),
                task.template_id.to_string(),
                task.client_id.to_string(),
                task.name,
                task.description,
                task.estimated_hours,
                skills,
                task.priority.as_str(),
                task.category,
                pattern,
                task.is_active,
                task.last_generated_date.map(|d| d.to_string()),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        if inserted == 0 {
            return Err(PersistenceError::Conflict(format!("recurring task {}", task.id)));
        }
        Ok(task)
    }

    fn update_recurring_task(&self, task: &RecurringTask) -> PersistenceResult<()> {
        super::validate_recurring_task(task)?;
        let pattern = serde_json::to_string(&task.recurrence_pattern)?;
        let skills = serde_json::to_string(&task.required_skills)?;
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE recurring_tasks SET template_id = ?2, client_id = ?3, name = ?4, \
             description = ?5, estimated_hours = ?6, required_skills = ?7, priority = ?8, \
             category = ?9, recurrence_pattern = ?10, is_active = ?11, \
             last_generated_date = ?12, updated_at = ?13 WHERE id = ?1",
            params![
                task.id.to_string(),
                task.template_id.to_string(),
                task.client_id.to_string(),
                task.name,
                task.description,
                task.estimated_hours,
                skills,
                task.priority.as_str(),
                task.category,
                pattern,
                task.is_active,
                task.last_generated_date.map(|d| d.to_string()),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        if updated == 0 {
            return Err(PersistenceError::NotFound(format!("recurring task {}", task.id)));
        }
        Ok(())
    }

    fn task_instances(&self) -> PersistenceResult<Vec<TaskInstance>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM task_instances ORDER BY due_date ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map([], InstanceRow::read)?;
        let mut instances = Vec::new();
        for row in rows {
            instances.push(row?.into_instance()?);
        }
        Ok(instances)
    }

    fn find_task_instance(&self, id: Uuid) -> PersistenceResult<Option<TaskInstance>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM task_instances WHERE id = ?1"
        ))?;
        let row = stmt
            .query_row(params![id.to_string()], InstanceRow::read)
            .optional()?;
        row.map(InstanceRow::into_instance).transpose()
    }

    fn insert_task_instance(&self, instance: TaskInstance) -> PersistenceResult<TaskInstance> {
        super::validate_task_instance(&instance)?;
        let skills = serde_json::to_string(&instance.required_skills)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO task_instances ({INSTANCE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                instance.id.to_string(),
                instance.recurring_task_id.map(|id| id.to_string()),
                instance.template_id.map(|id| id.to_string()),
                instance.client_id.to_string(),
                instance.name,
                instance.description,
                instance.due_date.to_string(),
                instance.estimated_hours,
                skills,
                instance.priority.as_str(),
                instance.category,
                instance.status.as_str(),
                instance.assigned_staff_id.map(|id| id.to_string()),
                instance.notes,
                instance.created_at.to_rfc3339(),
            ],
        )?;
        if inserted == 0 {
            return Err(PersistenceError::Conflict(format!("task instance {}", instance.id)));
        }
        Ok(instance)
    }

    fn delete_task_instance(&self, id: Uuid) -> PersistenceResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM task_instances WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(deleted > 0)
    }
}

fn parse_uuid(input: &str) -> PersistenceResult<Uuid> {
    Uuid::parse_str(input)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid id '{input}': {e}")))
}

fn parse_date(input: &str) -> PersistenceResult<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

fn parse_timestamp(input: &str) -> PersistenceResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(input)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| PersistenceError::InvalidData(format!("invalid timestamp '{input}': {e}")))
}
