//! Summarizer configuration.

use std::time::Duration;

/// HTTP summarizer configuration.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// API key sent in the `x-goog-api-key` header
    pub api_key: String,
    /// Base URL up to and including the API version
    pub base_url: String,
    /// Model name
    pub model: String,
    /// HTTP request timeout
    pub timeout: Duration,
    /// Instructions placed before the transcript
    pub prompt: String,
}

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PROMPT: &str = "Summarize the following video transcript. \
Write a short overview paragraph followed by the key points as a bulleted list. \
Only use information present in the transcript.";

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl SummarizerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("SUMMARIZER_API_KEY").unwrap_or_default(),
            base_url: std::env::var("SUMMARIZER_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("SUMMARIZER_MODEL").unwrap_or(defaults.model),
            timeout: std::env::var("SUMMARIZER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            prompt: std::env::var("SUMMARIZER_PROMPT").unwrap_or(defaults.prompt),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
