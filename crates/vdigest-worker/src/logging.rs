//! Structured per-item logging.

use tracing::{error, info, warn, Span};
use vdigest_models::WorkItemId;

/// Logger that tags every line with the work item and operation.
#[derive(Debug, Clone)]
pub struct ItemLogger {
    item_id: String,
    operation: String,
}

impl ItemLogger {
    pub fn new(item_id: &WorkItemId, operation: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            item_id = %self.item_id,
            operation = %self.operation,
            "Item started: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            item_id = %self.item_id,
            operation = %self.operation,
            "Item warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            item_id = %self.item_id,
            operation = %self.operation,
            "Item error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            item_id = %self.item_id,
            operation = %self.operation,
            "Item completed: {}", message
        );
    }

    /// Span covering all work on this item.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "work_item",
            item_id = %self.item_id,
            operation = %self.operation
        )
    }
}
