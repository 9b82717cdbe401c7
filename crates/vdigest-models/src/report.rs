//! Dispatch cycle reports.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a cycle stopped selecting items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every selected item was attempted
    #[default]
    Drained,
    /// Nothing was pending
    NothingPending,
    /// Our own daily counter reached the limit
    QuotaExhausted,
    /// The remote API reported its quota was used up
    RemoteQuotaExhausted,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Drained => "drained",
            StopReason::NothingPending => "nothing_pending",
            StopReason::QuotaExhausted => "quota_exhausted",
            StopReason::RemoteQuotaExhausted => "remote_quota_exhausted",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CycleReport {
    /// Quota day the cycle counted against
    pub day: NaiveDate,
    /// Items summarized successfully
    pub completed: u32,
    /// Items moved to failed in this cycle
    pub failed: u32,
    /// Items that failed but stay pending for a later cycle
    pub retried: u32,
    /// Selected items left untouched because the quota ran out
    pub skipped_due_to_quota: u32,
    /// Pending items left after the cycle
    pub remaining_pending: u64,
    /// Items released from a previous interrupted cycle
    pub recovered: u32,
    /// Quota counter value after the cycle
    pub quota_used: u32,
    pub stopped_reason: StopReason,
}

impl CycleReport {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            completed: 0,
            failed: 0,
            retried: 0,
            skipped_due_to_quota: 0,
            remaining_pending: 0,
            recovered: 0,
            quota_used: 0,
            stopped_reason: StopReason::default(),
        }
    }

    /// Items the external API was called for.
    pub fn processed(&self) -> u32 {
        self.completed + self.failed + self.retried
    }
}
