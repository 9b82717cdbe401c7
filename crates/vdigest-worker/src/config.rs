//! Dispatcher configuration.

use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};
use crate::scheduler::DailySchedule;

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Successful external calls allowed per UTC day
    pub daily_limit: u32,
    /// Upper bound on items selected per cycle
    pub batch_cap: u32,
    /// Attempts before an item is marked failed
    pub max_attempts: u32,
    /// Timeout for a single summarization call
    pub call_timeout: Duration,
    /// Daily run time, "HH:MM" in UTC
    pub run_at: String,
    /// Fire one cycle immediately at startup
    pub run_on_start: bool,
    /// Stop the cycle when the API reports its own quota is used up
    pub stop_on_remote_quota: bool,
    /// Minimum age of a processing item before recovery releases it
    pub stranded_after: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            daily_limit: 10,
            batch_cap: 50,
            max_attempts: 3,
            call_timeout: Duration::from_secs(90),
            run_at: "02:00".to_string(),
            run_on_start: false,
            stop_on_remote_quota: true,
            stranded_after: Duration::from_secs(900), // 15 minutes
        }
    }
}

impl DispatcherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            daily_limit: std::env::var("DISPATCH_DAILY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.daily_limit),
            batch_cap: std::env::var("DISPATCH_BATCH_CAP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batch_cap),
            max_attempts: std::env::var("DISPATCH_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            call_timeout: std::env::var("DISPATCH_CALL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.call_timeout),
            run_at: std::env::var("DISPATCH_RUN_AT").unwrap_or(defaults.run_at),
            run_on_start: std::env::var("DISPATCH_RUN_ON_START")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.run_on_start),
            stop_on_remote_quota: std::env::var("DISPATCH_STOP_ON_REMOTE_QUOTA")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.stop_on_remote_quota),
            stranded_after: std::env::var("DISPATCH_STRANDED_AFTER_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.stranded_after),
        }
    }

    /// Parsed daily run time.
    pub fn schedule(&self) -> WorkerResult<DailySchedule> {
        self.run_at.parse()
    }

    /// Reject values the dispatcher cannot work with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.batch_cap == 0 {
            return Err(WorkerError::config_error("DISPATCH_BATCH_CAP must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(WorkerError::config_error("DISPATCH_MAX_ATTEMPTS must be at least 1"));
        }
        if self.call_timeout.is_zero() {
            return Err(WorkerError::config_error("DISPATCH_CALL_TIMEOUT_SECS must be positive"));
        }
        if self.stranded_after <= self.call_timeout {
            return Err(WorkerError::config_error(
                "DISPATCH_STRANDED_AFTER_SECS must exceed the call timeout",
            ));
        }
        self.schedule()?;
        Ok(())
    }
}
