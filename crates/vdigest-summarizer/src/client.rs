//! Summarizer trait and Gemini HTTP client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vdigest_models::SummaryRequest;

use crate::config::SummarizerConfig;
use crate::error::{SummarizerError, SummarizerResult};

/// Summary text returned by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryResult {
    pub text: String,
    /// Model that produced the summary
    pub model: String,
}

/// External summarization API.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> SummarizerResult<SummaryResult>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini `generateContent` client.
pub struct GeminiSummarizer {
    client: Client,
    config: SummarizerConfig,
}

impl GeminiSummarizer {
    pub fn new(config: SummarizerConfig) -> SummarizerResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SummarizerError::config("SUMMARIZER_API_KEY not set"));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SummarizerError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> SummarizerResult<Self> {
        Self::new(SummarizerConfig::from_env())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_prompt(&self, request: &SummaryRequest) -> String {
        let title = request.title.as_deref().unwrap_or("(untitled)");
        format!(
            "{prompt}\n\nVIDEO: {title}\nURL: {url}\n\nTRANSCRIPT:\n{transcript}\n",
            prompt = self.config.prompt,
            title = title,
            url = request.video_url,
            transcript = request.transcript,
        )
    }
}

/// Map a non-success status to an error. Body text is truncated.
fn classify_status(status: StatusCode, body: String) -> SummarizerError {
    let body: String = body.chars().take(500).collect();
    match status {
        StatusCode::TOO_MANY_REQUESTS => SummarizerError::RemoteQuota(body),
        StatusCode::REQUEST_TIMEOUT => SummarizerError::ServerError {
            status: status.as_u16(),
            body,
        },
        s if s.is_server_error() => SummarizerError::ServerError {
            status: s.as_u16(),
            body,
        },
        s => SummarizerError::Rejected {
            status: s.as_u16(),
            body,
        },
    }
}

/// Pull the summary text out of a response body.
fn extract_text(body: &str) -> SummarizerResult<String> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| SummarizerError::invalid_response(format!("Failed to parse response: {}", e)))?;

    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .ok_or_else(|| SummarizerError::invalid_response("No candidates in response"))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(SummarizerError::invalid_response("Empty summary text"));
    }
    Ok(text.to_string())
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> SummarizerResult<SummaryResult> {
        let payload = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: self.build_prompt(request),
                }],
            }],
        };

        debug!(model = %self.config.model, url = %request.video_url, "Calling summarization API");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Summarization API returned an error");
            return Err(classify_status(status, body));
        }

        Ok(SummaryResult {
            text: extract_text(&body)?,
            model: self.config.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/models/gemini-2.5-flash:generateContent";

    fn request() -> SummaryRequest {
        SummaryRequest::new("https://youtube.com/watch?v=abc", "we talk about rust").with_title("Rust talk")
    }

    fn summarizer(server: &MockServer) -> GeminiSummarizer {
        let config = SummarizerConfig::default()
            .with_api_key("test-key")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_millis(500));
        GeminiSummarizer::new(config).unwrap()
    }

    fn ok_body(text: &str) -> serde_json::Value {
        json!({
            "candidates": [
                { "content": { "parts": [ { "text": text } ], "role": "model" } }
            ]
        })
    }

    #[tokio::test]
    async fn test_summarize_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("  A talk about Rust.  ")))
            .expect(1)
            .mount(&server)
            .await;

        let result = summarizer(&server).summarize(&request()).await.unwrap();
        assert_eq!(result.text, "A talk about Rust.");
        assert_eq!(result.model, "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_rate_limited_is_remote_quota() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let err = summarizer(&server).summarize(&request()).await.unwrap_err();
        assert!(err.is_remote_quota());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = summarizer(&server).summarize(&request()).await.unwrap_err();
        assert!(matches!(err, SummarizerError::ServerError { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_bad_request_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid argument"))
            .mount(&server)
            .await;

        let err = summarizer(&server).summarize(&request()).await.unwrap_err();
        assert!(matches!(err, SummarizerError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "promptFeedback": {} })))
            .mount(&server)
            .await;

        let err = summarizer(&server).summarize(&request()).await.unwrap_err();
        assert!(matches!(err, SummarizerError::InvalidResponse(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ok_body("late"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = summarizer(&server).summarize(&request()).await.unwrap_err();
        assert!(matches!(err, SummarizerError::Timeout));
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let err = GeminiSummarizer::new(SummarizerConfig::default()).err().unwrap();
        assert!(matches!(err, SummarizerError::Config(_)));
    }

    #[test]
    fn test_extract_text_shapes() {
        assert_eq!(
            extract_text(&ok_body("summary").to_string()).unwrap(),
            "summary"
        );
        assert!(extract_text("not json").is_err());
        assert!(extract_text(r#"{"candidates": []}"#).is_err());
        assert!(extract_text(r#"{"candidates": [{"content": {"parts": [{"text": "   "}]}}]}"#).is_err());
        assert!(extract_text(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).is_err());
    }

    #[test]
    fn test_prompt_includes_transcript() {
        let config = SummarizerConfig::default().with_api_key("k");
        let summarizer = GeminiSummarizer::new(config).unwrap();
        let prompt = summarizer.build_prompt(&request());
        assert!(prompt.contains("Rust talk"));
        assert!(prompt.contains("we talk about rust"));
    }
}
