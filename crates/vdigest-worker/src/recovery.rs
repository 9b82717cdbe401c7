//! Release of work items stranded in `processing`.
//!
//! A cycle that dies between claiming an item and recording its outcome
//! leaves the item in `processing`, where no later cycle would select it.
//! Recovery puts such items back to `pending` without counting an attempt.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use vdigest_queue::WorkItemStore;

use crate::error::WorkerResult;

pub const INTERRUPTED_REASON: &str = "interrupted before an outcome was recorded";

/// Finds and releases stranded items.
pub struct StrandedItemRecovery {
    store: Arc<dyn WorkItemStore>,
    /// Items updated more recently than this are assumed to be in flight.
    min_age: Duration,
}

impl StrandedItemRecovery {
    pub fn new(store: Arc<dyn WorkItemStore>, min_age: Duration) -> Self {
        Self { store, min_age }
    }

    /// Release every processing item older than `min_age` at `now`.
    /// Returns how many were released.
    pub async fn recover_once(&self, now: DateTime<Utc>) -> WorkerResult<u32> {
        let processing = self.store.list_processing().await?;
        if processing.is_empty() {
            return Ok(0);
        }

        let min_age = chrono::Duration::from_std(self.min_age).unwrap_or(chrono::Duration::MAX);
        let mut released = 0u32;

        for mut item in processing {
            let age = now.signed_duration_since(item.updated_at);
            if age < min_age {
                continue;
            }

            warn!(
                item_id = %item.id,
                attempts = item.attempts,
                updated_at = %item.updated_at,
                "Releasing stranded work item"
            );

            item.release(INTERRUPTED_REASON, now)?;
            self.store.update(&item).await?;
            released += 1;
        }

        if released > 0 {
            info!("Stranded item recovery complete: {} released", released);
        }

        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdigest_models::{SummaryRequest, WorkItem, WorkItemId, WorkItemStatus};
    use vdigest_queue::InMemoryWorkItemStore;

    async fn insert_processing(store: &InMemoryWorkItemStore, id: &str, updated_at: DateTime<Utc>) {
        let mut item = WorkItem::with_id(
            WorkItemId::from(id),
            SummaryRequest::new("https://example.com", "t"),
            updated_at,
        );
        item.attempts = 1;
        item.claim(updated_at).unwrap();
        store.insert(&item).await.unwrap();
    }

    #[tokio::test]
    async fn test_releases_only_old_items() {
        let store = InMemoryWorkItemStore::new();
        let now = Utc::now();
        insert_processing(&store, "old", now - chrono::Duration::hours(2)).await;
        insert_processing(&store, "fresh", now - chrono::Duration::seconds(10)).await;

        let recovery = StrandedItemRecovery::new(Arc::new(store.clone()), Duration::from_secs(600));
        assert_eq!(recovery.recover_once(now).await.unwrap(), 1);

        let old = store.get(&WorkItemId::from("old")).await.unwrap().unwrap();
        assert_eq!(old.status, WorkItemStatus::Pending);
        assert_eq!(old.attempts, 1);
        assert_eq!(old.last_error.as_deref(), Some(INTERRUPTED_REASON));

        let fresh = store.get(&WorkItemId::from("fresh")).await.unwrap().unwrap();
        assert_eq!(fresh.status, WorkItemStatus::Processing);
    }

    #[tokio::test]
    async fn test_nothing_to_recover() {
        let store = InMemoryWorkItemStore::new();
        let recovery = StrandedItemRecovery::new(Arc::new(store), Duration::from_secs(60));
        assert_eq!(recovery.recover_once(Utc::now()).await.unwrap(), 0);
    }
}
