//! Persistent state for the vdigest dispatcher.
//!
//! This crate provides:
//! - The `WorkItemStore` and `QuotaStore` seams the dispatcher is written against
//! - In-memory implementations for tests and single-process runs
//! - Redis implementations with atomic claims and quota increments

pub mod config;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use memory::{InMemoryQuotaStore, InMemoryWorkItemStore};
pub use redis_store::{RedisQuotaStore, RedisWorkItemStore};
pub use store::{QuotaStore, WorkItemStore};
