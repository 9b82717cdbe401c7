//! Redis-backed stores.
//!
//! Key layout (all under the configured prefix):
//! - `{prefix}:item:{id}`: work item JSON
//! - `{prefix}:pending`: sorted set of pending items scored by created_at
//!   millis, member `{sub-millisecond nanos:06}:{id}`
//! - `{prefix}:processing`: set of IDs currently processing
//! - `{prefix}:quota:{YYYY-MM-DD}`: successful call counter for a UTC day
//!
//! Redis orders equal scores by member, so the zero-padded nanos prefix keeps
//! items from the same millisecond in created_at-then-id order.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use redis::{AsyncCommands, Script};
use tracing::{debug, warn};
use vdigest_models::{day_key, WorkItem, WorkItemId};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::store::{QuotaStore, WorkItemStore};

/// Writes an item and keeps both indexes in step with its status.
/// ARGV: json, status, score, pending member, mode ("insert" | "update"), id.
const WRITE_ITEM_SCRIPT: &str = r#"
local exists = redis.call('EXISTS', KEYS[1])
if ARGV[5] == 'insert' and exists == 1 then
    return 0
end
if ARGV[5] == 'update' and exists == 0 then
    return 0
end

redis.call('SET', KEYS[1], ARGV[1])

if ARGV[2] == 'pending' then
    redis.call('ZADD', KEYS[2], ARGV[3], ARGV[4])
else
    redis.call('ZREM', KEYS[2], ARGV[4])
end

if ARGV[2] == 'processing' then
    redis.call('SADD', KEYS[3], ARGV[6])
else
    redis.call('SREM', KEYS[3], ARGV[6])
end

return 1
"#;

/// Claims a pending item. Whoever removes it from the pending set owns it.
/// Returns -1 without touching anything if the stored record no longer
/// matches the one the claim was built from.
/// ARGV: id, pending member, json read by the caller, claimed json.
const CLAIM_ITEM_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) ~= ARGV[3] then
    return -1
end
if redis.call('ZREM', KEYS[2], ARGV[2]) == 0 then
    return 0
end
redis.call('SET', KEYS[1], ARGV[4])
redis.call('SADD', KEYS[3], ARGV[1])
return 1
"#;

/// ARGV: limit, ttl seconds.
const INCREMENT_IF_BELOW_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current >= tonumber(ARGV[1]) then
    return 0
end
redis.call('INCR', KEYS[1])
redis.call('EXPIRE', KEYS[1], ARGV[2])
return 1
"#;

/// Record reads retried when the item changes under a claim.
const CLAIM_READ_ATTEMPTS: u32 = 3;

/// Result of one compare-and-claim round.
#[derive(Debug, PartialEq)]
enum ClaimAttempt {
    Claimed(WorkItem),
    NotPending,
    /// The record changed after it was read.
    Stale,
}

/// Pending-set member for an item. Sorts by created_at within a millisecond
/// score, then by ID.
fn pending_member(item: &WorkItem) -> String {
    format!(
        "{:06}:{}",
        item.created_at.timestamp_subsec_nanos() % 1_000_000,
        item.id
    )
}

fn id_from_member(member: &str) -> Option<&str> {
    member.split_once(':').map(|(_, id)| id)
}

/// Work items stored in Redis.
#[derive(Clone)]
pub struct RedisWorkItemStore {
    client: redis::Client,
    prefix: String,
}

impl RedisWorkItemStore {
    pub fn new(config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self::from_client(client, config.key_prefix.clone()))
    }

    pub fn from_client(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    /// Check the connection is usable.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    fn item_key(&self, id: &WorkItemId) -> String {
        format!("{}:item:{}", self.prefix, id)
    }

    fn pending_key(&self) -> String {
        format!("{}:pending", self.prefix)
    }

    fn processing_key(&self) -> String {
        format!("{}:processing", self.prefix)
    }

    async fn write(&self, item: &WorkItem, mode: &str) -> QueueResult<bool> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(item)?;

        let written: i32 = Script::new(WRITE_ITEM_SCRIPT)
            .key(self.item_key(&item.id))
            .key(self.pending_key())
            .key(self.processing_key())
            .arg(payload)
            .arg(item.status.as_str())
            .arg(item.created_at.timestamp_millis())
            .arg(pending_member(item))
            .arg(mode)
            .arg(item.id.as_str())
            .invoke_async(&mut conn)
            .await?;

        Ok(written == 1)
    }

    async fn get_raw(&self, id: &WorkItemId) -> QueueResult<Option<String>> {
        let mut conn = self.connection().await?;
        Ok(conn.get(self.item_key(id)).await?)
    }

    /// Claim from a record read as `raw`, refusing if it has since changed.
    async fn try_claim(&self, raw: &str, now: DateTime<Utc>) -> QueueResult<ClaimAttempt> {
        let mut item: WorkItem = serde_json::from_str(raw)?;
        if !item.is_pending() {
            return Ok(ClaimAttempt::NotPending);
        }
        item.claim(now)?;

        let mut conn = self.connection().await?;
        let claimed: i32 = Script::new(CLAIM_ITEM_SCRIPT)
            .key(self.item_key(&item.id))
            .key(self.pending_key())
            .key(self.processing_key())
            .arg(item.id.as_str())
            .arg(pending_member(&item))
            .arg(raw)
            .arg(serde_json::to_string(&item)?)
            .invoke_async(&mut conn)
            .await?;

        Ok(match claimed {
            1 => ClaimAttempt::Claimed(item),
            -1 => ClaimAttempt::Stale,
            _ => ClaimAttempt::NotPending,
        })
    }

    async fn load_many(&self, ids: Vec<String>) -> QueueResult<Vec<WorkItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection().await?;
        let keys: Vec<String> = ids
            .iter()
            .map(|id| format!("{}:item:{}", self.prefix, id))
            .collect();
        let payloads: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        let mut items = Vec::with_capacity(payloads.len());
        for (id, payload) in ids.iter().zip(payloads) {
            match payload {
                Some(json) => items.push(serde_json::from_str(&json)?),
                None => warn!(item_id = %id, "Indexed work item has no record"),
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl WorkItemStore for RedisWorkItemStore {
    async fn insert(&self, item: &WorkItem) -> QueueResult<()> {
        if !self.write(item, "insert").await? {
            return Err(QueueError::already_exists(item.id.as_str()));
        }
        debug!(item_id = %item.id, "Inserted work item");
        Ok(())
    }

    async fn get(&self, id: &WorkItemId) -> QueueResult<Option<WorkItem>> {
        self.get_raw(id)
            .await?
            .map(|json| serde_json::from_str(&json).map_err(QueueError::from))
            .transpose()
    }

    async fn list_pending(&self, limit: usize) -> QueueResult<Vec<WorkItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection().await?;
        let members: Vec<String> = conn
            .zrange(self.pending_key(), 0, limit as isize - 1)
            .await?;

        let mut ids = Vec::with_capacity(members.len());
        for member in &members {
            match id_from_member(member) {
                Some(id) => ids.push(id.to_string()),
                None => warn!(member = %member, "Malformed pending member"),
            }
        }
        self.load_many(ids).await
    }

    async fn count_pending(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let count: u64 = conn.zcard(self.pending_key()).await?;
        Ok(count)
    }

    async fn list_processing(&self) -> QueueResult<Vec<WorkItem>> {
        let mut conn = self.connection().await?;
        let mut ids: Vec<String> = conn.smembers(self.processing_key()).await?;
        ids.sort();
        self.load_many(ids).await
    }

    async fn claim(&self, id: &WorkItemId, now: DateTime<Utc>) -> QueueResult<Option<WorkItem>> {
        for _ in 0..CLAIM_READ_ATTEMPTS {
            let Some(raw) = self.get_raw(id).await? else {
                return Ok(None);
            };
            match self.try_claim(&raw, now).await? {
                ClaimAttempt::Claimed(item) => return Ok(Some(item)),
                ClaimAttempt::NotPending => {
                    debug!(item_id = %id, "Work item claimed elsewhere");
                    return Ok(None);
                }
                ClaimAttempt::Stale => debug!(item_id = %id, "Work item changed during claim, re-reading"),
            }
        }

        warn!(item_id = %id, "Work item kept changing during claim, skipping");
        Ok(None)
    }

    async fn update(&self, item: &WorkItem) -> QueueResult<()> {
        if !self.write(item, "update").await? {
            return Err(QueueError::not_found(item.id.as_str()));
        }
        Ok(())
    }
}

/// Daily quota counters stored in Redis.
#[derive(Clone)]
pub struct RedisQuotaStore {
    client: redis::Client,
    prefix: String,
    ttl_secs: u64,
}

impl RedisQuotaStore {
    pub fn new(config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self::from_client(client, config.key_prefix.clone(), config.quota_ttl_secs))
    }

    pub fn from_client(client: redis::Client, prefix: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            ttl_secs,
        }
    }

    fn quota_key(&self, day: NaiveDate) -> String {
        format!("{}:quota:{}", self.prefix, day_key(day))
    }
}

#[async_trait]
impl QuotaStore for RedisQuotaStore {
    async fn get_count(&self, day: NaiveDate) -> QueueResult<u32> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        let count: Option<u32> = conn.get(self.quota_key(day)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn increment_if_below(&self, day: NaiveDate, limit: u32) -> QueueResult<bool> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;

        let incremented: i32 = Script::new(INCREMENT_IF_BELOW_SCRIPT)
            .key(self.quota_key(day))
            .arg(limit)
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await?;

        Ok(incremented == 1)
    }
}
