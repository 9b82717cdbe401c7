//! Work items awaiting summarization.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{TransitionError, TransitionResult};

/// Unique identifier for a work item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct WorkItemId(pub String);

impl WorkItemId {
    /// Generate a new random work item ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Work item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    /// Waiting for a dispatch cycle
    #[default]
    Pending,
    /// Claimed by a cycle, external call in flight
    Processing,
    /// Summary stored
    Completed,
    /// Gave up after max attempts
    Failed,
}

impl WorkItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemStatus::Pending => "pending",
            WorkItemStatus::Processing => "processing",
            WorkItemStatus::Completed => "completed",
            WorkItemStatus::Failed => "failed",
        }
    }

    /// Terminal items are never selected again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkItemStatus::Completed | WorkItemStatus::Failed)
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input handed to the summarization API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryRequest {
    /// Source video URL
    pub video_url: String,

    /// Video title, when the ingestion step captured one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Full transcript text
    pub transcript: String,
}

impl SummaryRequest {
    pub fn new(video_url: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self {
            video_url: video_url.into(),
            title: None,
            transcript: transcript.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// What a failed attempt did to the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to pending, eligible on a later cycle
    Retry,
    /// Attempts exhausted, item is now failed
    Exhausted,
}

/// One transcribed video awaiting summarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkItem {
    /// Unique item ID
    pub id: WorkItemId,

    /// Current status
    #[serde(default)]
    pub status: WorkItemStatus,

    /// Summarization input
    pub request: SummaryRequest,

    /// Creation timestamp, drives FIFO order
    pub created_at: DateTime<Utc>,

    /// Last transition timestamp
    pub updated_at: DateTime<Utc>,

    /// Finished processing attempts (failed or successful)
    #[serde(default)]
    pub attempts: u32,

    /// Error from the latest failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Summary text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Completed at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// Create a new pending item.
    pub fn new(request: SummaryRequest, created_at: DateTime<Utc>) -> Self {
        Self::with_id(WorkItemId::new(), request, created_at)
    }

    /// Create a new pending item with a caller-chosen ID.
    pub fn with_id(id: WorkItemId, request: SummaryRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: WorkItemStatus::Pending,
            request,
            created_at,
            updated_at: created_at,
            attempts: 0,
            last_error: None,
            result: None,
            completed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == WorkItemStatus::Pending
    }

    /// pending -> processing
    pub fn claim(&mut self, now: DateTime<Utc>) -> TransitionResult<()> {
        match self.status {
            WorkItemStatus::Pending => {
                self.status = WorkItemStatus::Processing;
                self.updated_at = now;
                Ok(())
            }
            WorkItemStatus::Processing | WorkItemStatus::Completed | WorkItemStatus::Failed => {
                Err(TransitionError::new(&self.id, self.status, "claim"))
            }
        }
    }

    /// processing -> completed
    ///
    /// The successful attempt is counted, capped at `max_attempts` like
    /// [`WorkItem::record_failure`].
    pub fn complete(
        &mut self,
        summary: impl Into<String>,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> TransitionResult<()> {
        match self.status {
            WorkItemStatus::Processing => {
                self.status = WorkItemStatus::Completed;
                self.attempts = self.attempts.saturating_add(1).min(max_attempts);
                self.result = Some(summary.into());
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(())
            }
            WorkItemStatus::Pending | WorkItemStatus::Completed | WorkItemStatus::Failed => {
                Err(TransitionError::new(&self.id, self.status, "complete"))
            }
        }
    }

    /// processing -> pending, or processing -> failed once attempts reach
    /// `max_attempts`.
    ///
    /// `attempts` is capped at `max_attempts` so a lowered limit never leaves
    /// an item above it.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> TransitionResult<FailureOutcome> {
        match self.status {
            WorkItemStatus::Processing => {
                self.attempts = self.attempts.saturating_add(1).min(max_attempts);
                self.last_error = Some(error.into());
                self.updated_at = now;

                if self.attempts >= max_attempts {
                    self.status = WorkItemStatus::Failed;
                    Ok(FailureOutcome::Exhausted)
                } else {
                    self.status = WorkItemStatus::Pending;
                    Ok(FailureOutcome::Retry)
                }
            }
            WorkItemStatus::Pending | WorkItemStatus::Completed | WorkItemStatus::Failed => {
                Err(TransitionError::new(&self.id, self.status, "record a failure on"))
            }
        }
    }

    /// processing -> pending without counting an attempt. Used for items
    /// stranded by an interrupted cycle.
    pub fn release(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> TransitionResult<()> {
        match self.status {
            WorkItemStatus::Processing => {
                self.status = WorkItemStatus::Pending;
                self.last_error = Some(reason.into());
                self.updated_at = now;
                Ok(())
            }
            WorkItemStatus::Pending | WorkItemStatus::Completed | WorkItemStatus::Failed => {
                Err(TransitionError::new(&self.id, self.status, "release"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item() -> WorkItem {
        let created = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        WorkItem::with_id(
            WorkItemId::from("item-1"),
            SummaryRequest::new("https://youtube.com/watch?v=abc", "hello world"),
            created,
        )
    }

    #[test]
    fn test_new_item_is_pending() {
        let item = item();
        assert_eq!(item.status, WorkItemStatus::Pending);
        assert_eq!(item.attempts, 0);
        assert!(item.result.is_none());
        assert!(item.last_error.is_none());
    }

    #[test]
    fn test_success_path() {
        let mut item = item();
        let now = Utc::now();

        item.claim(now).unwrap();
        assert_eq!(item.status, WorkItemStatus::Processing);

        item.complete("a summary", 3, now).unwrap();
        assert_eq!(item.status, WorkItemStatus::Completed);
        assert_eq!(item.attempts, 1);
        assert_eq!(item.result.as_deref(), Some("a summary"));
        assert_eq!(item.completed_at, Some(now));
    }

    #[test]
    fn test_failures_until_exhausted() {
        let mut item = item();
        let now = Utc::now();

        for expected in 1..3 {
            item.claim(now).unwrap();
            let outcome = item.record_failure("boom", 3, now).unwrap();
            assert_eq!(outcome, FailureOutcome::Retry);
            assert_eq!(item.status, WorkItemStatus::Pending);
            assert_eq!(item.attempts, expected);
        }

        item.claim(now).unwrap();
        let outcome = item.record_failure("boom again", 3, now).unwrap();
        assert_eq!(outcome, FailureOutcome::Exhausted);
        assert_eq!(item.status, WorkItemStatus::Failed);
        assert_eq!(item.attempts, 3);
        assert_eq!(item.last_error.as_deref(), Some("boom again"));
        assert!(item.claim(now).is_err());
    }

    #[test]
    fn test_attempts_capped_at_lowered_limit() {
        let mut item = item();
        item.attempts = 4;
        item.claim(Utc::now()).unwrap();

        let outcome = item.record_failure("boom", 3, Utc::now()).unwrap();
        assert_eq!(outcome, FailureOutcome::Exhausted);
        assert_eq!(item.attempts, 3);
    }

    #[test]
    fn test_success_attempts_capped_at_lowered_limit() {
        let mut item = item();
        item.attempts = 2;
        item.claim(Utc::now()).unwrap();

        item.complete("late success", 2, Utc::now()).unwrap();
        assert_eq!(item.status, WorkItemStatus::Completed);
        assert_eq!(item.attempts, 2);
    }

    #[test]
    fn test_release_keeps_attempts() {
        let mut item = item();
        item.attempts = 1;
        item.claim(Utc::now()).unwrap();

        item.release("interrupted", Utc::now()).unwrap();
        assert_eq!(item.status, WorkItemStatus::Pending);
        assert_eq!(item.attempts, 1);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut item = item();
        let now = Utc::now();

        let err = item.complete("nope", 3, now).unwrap_err();
        assert_eq!(err.from, WorkItemStatus::Pending);
        assert!(item.record_failure("nope", 3, now).is_err());
        assert!(item.release("nope", now).is_err());

        item.claim(now).unwrap();
        assert!(item.claim(now).is_err());

        item.complete("done", 3, now).unwrap();
        assert!(item.record_failure("late", 3, now).is_err());
        assert!(item.release("late", now).is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&WorkItemStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert!(WorkItemStatus::Failed.is_terminal());
        assert!(!WorkItemStatus::Pending.is_terminal());
    }
}
