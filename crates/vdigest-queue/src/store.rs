//! Store traits the dispatcher is written against.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use vdigest_models::{WorkItem, WorkItemId};

use crate::error::QueueResult;

/// Persistent work item records.
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    /// Add a new item. Fails with `AlreadyExists` if the ID is taken.
    async fn insert(&self, item: &WorkItem) -> QueueResult<()>;

    async fn get(&self, id: &WorkItemId) -> QueueResult<Option<WorkItem>>;

    /// Oldest pending items first (created_at, then id), at most `limit`.
    async fn list_pending(&self, limit: usize) -> QueueResult<Vec<WorkItem>>;

    async fn count_pending(&self) -> QueueResult<u64>;

    /// Items currently marked processing.
    async fn list_processing(&self) -> QueueResult<Vec<WorkItem>>;

    /// Atomically move a pending item to processing.
    ///
    /// Returns `None` when the item is no longer pending (or gone), meaning
    /// someone else got to it first.
    async fn claim(&self, id: &WorkItemId, now: DateTime<Utc>) -> QueueResult<Option<WorkItem>>;

    /// Persist an existing item. Fails with `NotFound` if it was never inserted.
    async fn update(&self, item: &WorkItem) -> QueueResult<()>;
}

/// Per-day counter of successful external calls.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn get_count(&self, day: NaiveDate) -> QueueResult<u32>;

    /// Increment the day's counter unless it already reached `limit`.
    /// Returns whether the increment happened.
    async fn increment_if_below(&self, day: NaiveDate, limit: u32) -> QueueResult<bool>;
}
