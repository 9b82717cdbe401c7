//! Summarizer error types.

use thiserror::Error;

pub type SummarizerResult<T> = Result<T, SummarizerError>;

#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("Summarization call timed out")]
    Timeout,

    #[error("Remote quota exceeded: {0}")]
    RemoteQuota(String),

    #[error("Summarization API returned {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Summarization API rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response shape: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SummarizerError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The API refused because its own quota is used up.
    pub fn is_remote_quota(&self) -> bool {
        matches!(self, SummarizerError::RemoteQuota(_))
    }

    /// Failures expected to clear up on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SummarizerError::Timeout
                | SummarizerError::RemoteQuota(_)
                | SummarizerError::ServerError { .. }
                | SummarizerError::Network(_)
                | SummarizerError::InvalidResponse(_)
        )
    }
}

impl From<reqwest::Error> for SummarizerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SummarizerError::Timeout
        } else {
            // Drop the URL so request details never end up in stored errors
            SummarizerError::Network(e.without_url().to_string())
        }
    }
}
