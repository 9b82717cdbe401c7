//! In-memory stores.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};
use vdigest_models::{WorkItem, WorkItemId, WorkItemStatus};

use crate::error::{QueueError, QueueResult};
use crate::store::{QuotaStore, WorkItemStore};

/// Work items held in a process-local map. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkItemStore {
    items: Arc<RwLock<HashMap<WorkItemId, WorkItem>>>,
}

impl InMemoryWorkItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn with_status(&self, status: WorkItemStatus) -> Vec<WorkItem> {
        let items = self.items.read().await;
        let mut matching: Vec<WorkItem> = items
            .values()
            .filter(|item| item.status == status)
            .cloned()
            .collect();
        sort_fifo(&mut matching);
        matching
    }
}

fn sort_fifo(items: &mut [WorkItem]) {
    items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[async_trait]
impl WorkItemStore for InMemoryWorkItemStore {
    async fn insert(&self, item: &WorkItem) -> QueueResult<()> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.id) {
            return Err(QueueError::already_exists(item.id.as_str()));
        }
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn get(&self, id: &WorkItemId) -> QueueResult<Option<WorkItem>> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn list_pending(&self, limit: usize) -> QueueResult<Vec<WorkItem>> {
        let mut pending = self.with_status(WorkItemStatus::Pending).await;
        pending.truncate(limit);
        Ok(pending)
    }

    async fn count_pending(&self) -> QueueResult<u64> {
        let items = self.items.read().await;
        Ok(items.values().filter(|item| item.is_pending()).count() as u64)
    }

    async fn list_processing(&self) -> QueueResult<Vec<WorkItem>> {
        Ok(self.with_status(WorkItemStatus::Processing).await)
    }

    async fn claim(&self, id: &WorkItemId, now: DateTime<Utc>) -> QueueResult<Option<WorkItem>> {
        let mut items = self.items.write().await;
        match items.get_mut(id) {
            Some(item) if item.is_pending() => {
                item.claim(now)?;
                Ok(Some(item.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn update(&self, item: &WorkItem) -> QueueResult<()> {
        let mut items = self.items.write().await;
        match items.get_mut(&item.id) {
            Some(existing) => {
                *existing = item.clone();
                Ok(())
            }
            None => Err(QueueError::not_found(item.id.as_str())),
        }
    }
}

/// Daily counters held in a process-local map. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuotaStore {
    counts: Arc<Mutex<HashMap<NaiveDate, u32>>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn get_count(&self, day: NaiveDate) -> QueueResult<u32> {
        Ok(self.counts.lock().await.get(&day).copied().unwrap_or(0))
    }

    async fn increment_if_below(&self, day: NaiveDate, limit: u32) -> QueueResult<bool> {
        let mut counts = self.counts.lock().await;
        // Earlier days can never be charged again
        counts.retain(|d, _| *d >= day);

        let count = counts.entry(day).or_insert(0);
        if *count >= limit {
            return Ok(false);
        }
        *count += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use vdigest_models::SummaryRequest;

    fn item_at(id: &str, minute: u32) -> WorkItem {
        let created = Utc.with_ymd_and_hms(2025, 6, 1, 8, minute, 0).unwrap();
        WorkItem::with_id(
            WorkItemId::from(id),
            SummaryRequest::new(format!("https://example.com/{}", id), "transcript"),
            created,
        )
    }

    #[tokio::test]
    async fn test_list_pending_fifo_with_id_tiebreak() {
        let store = InMemoryWorkItemStore::new();
        store.insert(&item_at("c", 5)).await.unwrap();
        store.insert(&item_at("b", 1)).await.unwrap();
        store.insert(&item_at("a", 1)).await.unwrap();
        store.insert(&item_at("d", 0)).await.unwrap();

        let ids: Vec<String> = store
            .list_pending(10)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id.0)
            .collect();
        assert_eq!(ids, vec!["d", "a", "b", "c"]);

        assert_eq!(store.list_pending(2).await.unwrap().len(), 2);
        assert_eq!(store.count_pending().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_insert_duplicate_rejected() {
        let store = InMemoryWorkItemStore::new();
        store.insert(&item_at("a", 0)).await.unwrap();
        let err = store.insert(&item_at("a", 1)).await.unwrap_err();
        assert!(matches!(err, QueueError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_claim_only_once() {
        let store = InMemoryWorkItemStore::new();
        store.insert(&item_at("a", 0)).await.unwrap();
        let id = WorkItemId::from("a");

        let claimed = store.claim(&id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.status, WorkItemStatus::Processing);
        assert!(store.claim(&id, Utc::now()).await.unwrap().is_none());
        assert!(store.claim(&WorkItemId::from("missing"), Utc::now()).await.unwrap().is_none());

        assert_eq!(store.count_pending().await.unwrap(), 0);
        assert_eq!(store.list_processing().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_requires_existing() {
        let store = InMemoryWorkItemStore::new();
        let err = store.update(&item_at("a", 0)).await.unwrap_err();
        assert!(matches!(err, QueueError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_quota_increment_stops_at_limit() {
        let quota = InMemoryQuotaStore::new();
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        for _ in 0..3 {
            assert!(quota.increment_if_below(day, 3).await.unwrap());
        }
        assert!(!quota.increment_if_below(day, 3).await.unwrap());
        assert_eq!(quota.get_count(day).await.unwrap(), 3);

        let next = day + Duration::days(1);
        assert_eq!(quota.get_count(next).await.unwrap(), 0);
        assert!(quota.increment_if_below(next, 3).await.unwrap());
        assert_eq!(quota.get_count(day).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_quota_concurrent_increments_never_exceed_limit() {
        let quota = InMemoryQuotaStore::new();
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let quota = quota.clone();
                tokio::spawn(async move { quota.increment_if_below(day, 10).await.unwrap() })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 10);
        assert_eq!(quota.get_count(day).await.unwrap(), 10);
    }
}
