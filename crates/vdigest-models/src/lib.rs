//! Shared data models for the vdigest dispatcher.
//!
//! This crate provides Serde-serializable types for:
//! - Work items awaiting summarization and their status machine
//! - Summary requests handed to the external API
//! - Per-cycle dispatch reports
//! - UTC day keys for the daily quota counter

pub mod error;
pub mod quota;
pub mod report;
pub mod work_item;

pub use error::{TransitionError, TransitionResult};
pub use quota::{day_key, quota_day};
pub use report::{CycleReport, StopReason};
pub use work_item::{FailureOutcome, SummaryRequest, WorkItem, WorkItemId, WorkItemStatus};
