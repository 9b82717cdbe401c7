//! Store error types.

use thiserror::Error;
use vdigest_models::TransitionError;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Work item not found: {0}")]
    NotFound(String),

    #[error("Work item already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists(id.into())
    }

    /// Connection-level failures that may clear up on their own.
    pub fn is_retryable(&self) -> bool {
        match self {
            QueueError::ConnectionFailed(_) => true,
            QueueError::Redis(e) => e.is_io_error() || e.is_connection_dropped() || e.is_timeout(),
            _ => false,
        }
    }
}
