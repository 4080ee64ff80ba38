use super::{PersistenceError, PersistenceResult, TaskStore};
use crate::task::{RecurringTask, TaskInstance};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreState {
    recurring: Vec<RecurringTask>,
    instances: Vec<TaskInstance>,
}

/// Store kept entirely in memory; rows are returned in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        recurring: Vec<RecurringTask>,
        instances: Vec<TaskInstance>,
    ) -> PersistenceResult<Self> {
        super::validate_recurring_tasks(&recurring)?;
        super::validate_task_instances(&instances)?;
        Ok(Self {
            state: Mutex::new(StoreState {
                recurring,
                instances,
            }),
        })
    }

    /// Replaces the contents with those of `other`.
    pub fn replace_with(&self, other: InMemoryTaskStore) -> PersistenceResult<()> {
        let incoming = other
            .state
            .into_inner()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        *self.lock()? = incoming;
        Ok(())
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| PersistenceError::LockPoisoned)
    }
}

impl TaskStore for InMemoryTaskStore {
    fn recurring_tasks(&self) -> PersistenceResult<Vec<RecurringTask>> {
        Ok(self.lock()?.recurring.clone())
    }

    fn find_recurring_task(&self, id: Uuid) -> PersistenceResult<Option<RecurringTask>> {
        Ok(self.lock()?.recurring.iter().find(|t| t.id == id).cloned())
    }

    fn insert_recurring_task(&self, task: RecurringTask) -> PersistenceResult<RecurringTask> {
        super::validate_recurring_task(&task)?;
        let mut state = self.lock()?;
        if state.recurring.iter().any(|t| t.id == task.id) {
            return Err(PersistenceError::Conflict(format!("recurring task {}", task.id)));
        }
        state.recurring.push(task.clone());
        Ok(task)
    }

    fn update_recurring_task(&self, task: &RecurringTask) -> PersistenceResult<()> {
        super::validate_recurring_task(task)?;
        let mut state = self.lock()?;
        let slot = state
            .recurring
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| PersistenceError::NotFound(format!("recurring task {}", task.id)))?;
        *slot = task.clone();
        Ok(())
    }

    fn task_instances(&self) -> PersistenceResult<Vec<TaskInstance>> {
        Ok(self.lock()?.instances.clone())
    }

    fn find_task_instance(&self, id: Uuid) -> PersistenceResult<Option<TaskInstance>> {
        Ok(self.lock()?.instances.iter().find(|i| i.id == id).cloned())
    }

    fn insert_task_instance(&self, instance: TaskInstance) -> PersistenceResult<TaskInstance> {
        super::validate_task_instance(&instance)?;
        let mut state = self.lock()?;
        if state.instances.iter().any(|i| i.id == instance.id) {
            return Err(PersistenceError::Conflict(format!("task instance {}", instance.id)));
        }
        state.instances.push(instance.clone());
        Ok(instance)
    }

    fn delete_task_instance(&self, id: Uuid) -> PersistenceResult<bool> {
        let mut state = self.lock()?;
        let before = state.instances.len();
        state.instances.retain(|i| i.id != id);
        Ok(state.instances.len() != before)
    }
}
