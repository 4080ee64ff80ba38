pub mod bulk_copy;
pub mod demand;
pub mod generation;
pub mod next_occurrence;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchItemKind {
    RecurringTask,
    TaskInstance,
}

/// One failed item of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchError {
    pub item_id: Uuid,
    pub kind: BatchItemKind,
    pub message: String,
}

impl BatchError {
    pub fn new(item_id: Uuid, kind: BatchItemKind, message: impl Into<String>) -> Self {
        Self {
            item_id,
            kind,
            message: message.into(),
        }
    }

    pub fn recurring(item_id: Uuid, message: impl Into<String>) -> Self {
        Self::new(item_id, BatchItemKind::RecurringTask, message)
    }
}
