//! Status transition errors.

use thiserror::Error;

use crate::work_item::{WorkItemId, WorkItemStatus};

pub type TransitionResult<T> = Result<T, TransitionError>;

/// Raised when a work item is asked to move along an edge the status
/// machine does not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {action} work item {id} while it is {from}")]
pub struct TransitionError {
    pub id: WorkItemId,
    pub from: WorkItemStatus,
    pub action: &'static str,
}

impl TransitionError {
    pub fn new(id: &WorkItemId, from: WorkItemStatus, action: &'static str) -> Self {
        Self {
            id: id.clone(),
            from,
            action,
        }
    }
}
