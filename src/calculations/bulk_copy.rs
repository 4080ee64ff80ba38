use super::{BatchError, BatchItemKind};
use crate::persistence::{PersistenceError, TaskStore};
use crate::task::{RecurringTask, TaskInstance};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyReport {
    pub recurring: Vec<RecurringTask>,
    pub ad_hoc: Vec<TaskInstance>,
    pub errors: Vec<BatchError>,
}

impl CopyReport {
    pub fn copied(&self) -> usize {
        self.recurring.len() + self.ad_hoc.len()
    }

    pub fn to_cli_summary(&self) -> String {
        let mut parts = vec![
            format!("recurring={}", self.recurring.len()),
            format!("ad_hoc={}", self.ad_hoc.len()),
        ];
        if !self.errors.is_empty() {
            parts.push(format!("errors={}", self.errors.len()));
        }
        parts.join(", ")
    }
}

/// Copies recurring tasks and task instances to `target_client_id`.
///
/// Each item is copied independently; a failed item is recorded in the
/// report and the remaining items are still attempted.
pub fn copy_tasks<S: TaskStore + ?Sized>(
    store: &S,
    recurring_ids: &[Uuid],
    instance_ids: &[Uuid],
    target_client_id: Uuid,
) -> CopyReport {
    let mut report = CopyReport::default();

    for id in recurring_ids {
        match copy_recurring(store, *id, target_client_id) {
            Ok(copy) => report.recurring.push(copy),
            Err(err) => {
                warn!(task_id = %id, error = %err, "recurring task copy failed");
                report.errors.push(BatchError::new(*id, BatchItemKind::RecurringTask, err.to_string()));
            }
        }
    }

    for id in instance_ids {
        match copy_instance(store, *id, target_client_id) {
            Ok(copy) => report.ad_hoc.push(copy),
            Err(err) => {
                warn!(instance_id = %id, error = %err, "task instance copy failed");
                report.errors.push(BatchError::new(*id, BatchItemKind::TaskInstance, err.to_string()));
            }
        }
    }

    info!(
        %target_client_id,
        recurring = report.recurring.len(),
        ad_hoc = report.ad_hoc.len(),
        errors = report.errors.len(),
        "bulk copy finished"
    );
    report
}

fn copy_recurring<S: TaskStore + ?Sized>(
    store: &S,
    id: Uuid,
    target_client_id: Uuid,
) -> Result<RecurringTask, PersistenceError> {
    let source = store
        .find_recurring_task(id)?
        .ok_or_else(|| PersistenceError::NotFound(format!("recurring task {id}")))?;
    store.insert_recurring_task(source.copy_for_client(target_client_id))
}

fn copy_instance<S: TaskStore + ?Sized>(
    store: &S,
    id: Uuid,
    target_client_id: Uuid,
) -> Result<TaskInstance, PersistenceError> {
    let source = store
        .find_task_instance(id)?
        .ok_or_else(|| PersistenceError::NotFound(format!("task instance {id}")))?;
    store.insert_task_instance(source.copy_for_client(target_client_id))
}
