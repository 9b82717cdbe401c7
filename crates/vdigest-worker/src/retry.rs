//! Startup backoff and failure log suppression for the scheduler loop.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Exponential backoff for a startup dependency check.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub operation_name: String,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Sleep before the first retry, doubled each time up to `max_delay`.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn backoff(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay)
    }
}

/// Await `operation` until it succeeds or `max_retries` retries have failed.
/// The last error is returned.
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retry = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if retry < config.max_retries => {
                let delay = config.backoff(retry);
                retry += 1;
                warn!(
                    operation = %config.operation_name,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, backing off: {}", e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Counts consecutive failed runs of a repeating task and mutes the error
/// log once more than `max_logged` have failed in a row.
#[derive(Debug)]
pub struct FailureTracker {
    consecutive: u32,
    max_logged: u32,
}

impl FailureTracker {
    pub fn new(max_logged: u32) -> Self {
        Self {
            consecutive: 0,
            max_logged,
        }
    }

    pub fn record_success(&mut self) {
        if self.consecutive > self.max_logged {
            info!(
                failures = self.consecutive,
                "Recovered, resuming failure logs"
            );
        }
        self.consecutive = 0;
    }

    /// Returns `true` while this failure should still be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        if self.consecutive == self.max_logged + 1 {
            warn!(
                failures = self.consecutive,
                "Muting failure logs until the next success"
            );
        }
        self.consecutive <= self.max_logged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(name: &str) -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(1),
            ..RetryConfig::new(name)
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            ..RetryConfig::new("test")
        };

        assert_eq!(config.backoff(0), Duration::from_millis(100));
        assert_eq!(config.backoff(1), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(800));
        assert_eq!(config.backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn test_failure_tracker_mutes_then_resumes() {
        let mut tracker = FailureTracker::new(2);

        assert!(tracker.record_failure());
        assert!(tracker.record_failure());
        assert!(!tracker.record_failure());
        assert!(!tracker.record_failure());

        tracker.record_success();
        assert!(tracker.record_failure());
    }

    #[tokio::test]
    async fn test_retry_async_eventual_success() {
        let calls = AtomicU32::new(0);

        let result = retry_async(&fast("test"), || {
            let count = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err("transient")
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_async_returns_last_error() {
        let calls = AtomicU32::new(0);
        let config = fast("test").with_max_retries(2);

        let result = retry_async(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("down") }
        })
        .await;

        assert_eq!(result, Err("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
