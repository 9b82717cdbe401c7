//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("A dispatch cycle is already running")]
    CycleInProgress,

    #[error("Store error: {0}")]
    Store(#[from] vdigest_queue::QueueError),

    #[error("Summarizer error: {0}")]
    Summarizer(#[from] vdigest_summarizer::SummarizerError),

    #[error(transparent)]
    Transition(#[from] vdigest_models::TransitionError),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Store(e) => e.is_retryable(),
            WorkerError::CycleInProgress => true,
            _ => false,
        }
    }
}
