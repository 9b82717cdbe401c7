//! Summarization API client.
//!
//! The dispatcher talks to the external API through the `Summarizer` trait;
//! `GeminiSummarizer` is the HTTP implementation for a Gemini-style
//! `generateContent` endpoint.

pub mod client;
pub mod config;
pub mod error;

pub use client::{GeminiSummarizer, Summarizer, SummaryResult};
pub use config::SummarizerConfig;
pub use error::{SummarizerError, SummarizerResult};
