use crate::task::{RecurringTask, TaskInstance};
use crate::task_validation;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("store lock poisoned")]
    LockPoisoned,
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value.to_string())
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Collections of recurring tasks and task instances.
///
/// Every write is its own unit; callers composing several writes get no
/// atomicity across them.
pub trait TaskStore {
    fn recurring_tasks(&self) -> PersistenceResult<Vec<RecurringTask>>;
    fn find_recurring_task(&self, id: Uuid) -> PersistenceResult<Option<RecurringTask>>;
    fn insert_recurring_task(&self, task: RecurringTask) -> PersistenceResult<RecurringTask>;
    fn update_recurring_task(&self, task: &RecurringTask) -> PersistenceResult<()>;

    fn task_instances(&self) -> PersistenceResult<Vec<TaskInstance>>;
    fn find_task_instance(&self, id: Uuid) -> PersistenceResult<Option<TaskInstance>>;
    fn insert_task_instance(&self, instance: TaskInstance) -> PersistenceResult<TaskInstance>;
    fn delete_task_instance(&self, id: Uuid) -> PersistenceResult<bool>;

    /// Soft delete. Returns false when the task does not exist.
    fn deactivate_recurring_task(&self, id: Uuid) -> PersistenceResult<bool> {
        let Some(mut task) = self.find_recurring_task(id)? else {
            return Ok(false);
        };
        task.deactivate();
        self.update_recurring_task(&task)?;
        Ok(true)
    }

    fn active_recurring_tasks(&self) -> PersistenceResult<Vec<RecurringTask>> {
        Ok(self
            .recurring_tasks()?
            .into_iter()
            .filter(|task| task.is_active)
            .collect())
    }
}

pub fn validate_recurring_tasks(tasks: &[RecurringTask]) -> PersistenceResult<()> {
    task_validation::validate_recurring_collection(tasks)
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))
}

pub fn validate_task_instances(instances: &[TaskInstance]) -> PersistenceResult<()> {
    task_validation::validate_instance_collection(instances)
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))
}

pub(crate) fn validate_recurring_task(task: &RecurringTask) -> PersistenceResult<()> {
    task_validation::validate_recurring_task(task)
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))
}

pub(crate) fn validate_task_instance(instance: &TaskInstance) -> PersistenceResult<()> {
    task_validation::validate_task_instance(instance)
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_recurring_tasks_from_csv, load_store_from_json, save_recurring_tasks_to_csv,
    save_store_to_json,
};
pub use memory::InMemoryTaskStore;
