//! Quota-bounded FIFO dispatch cycle.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn, Instrument};

use vdigest_models::{quota_day, CycleReport, FailureOutcome, StopReason, WorkItem};
use vdigest_queue::{QueueConfig, QuotaStore, RedisQuotaStore, RedisWorkItemStore, WorkItemStore};
use vdigest_summarizer::{GeminiSummarizer, Summarizer, SummarizerError};

use crate::config::DispatcherConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::ItemLogger;
use crate::metrics;
use crate::recovery::StrandedItemRecovery;
use crate::retry::{retry_async, RetryConfig};

/// What happened to one selected item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    /// Summary stored. `counted` is false when the quota counter refused the
    /// increment because another dispatcher used up the day first.
    Completed { counted: bool },
    Retried { remote_quota: bool },
    Failed { remote_quota: bool },
    /// No longer pending when we tried to claim it.
    Skipped,
}

/// Sends pending work items to the summarizer within the daily quota.
pub struct Dispatcher {
    store: Arc<dyn WorkItemStore>,
    quota: Arc<dyn QuotaStore>,
    summarizer: Arc<dyn Summarizer>,
    recovery: StrandedItemRecovery,
    config: DispatcherConfig,
    cycle_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn WorkItemStore>,
        quota: Arc<dyn QuotaStore>,
        summarizer: Arc<dyn Summarizer>,
        config: DispatcherConfig,
    ) -> Self {
        let recovery = StrandedItemRecovery::new(store.clone(), config.stranded_after);
        Self {
            store,
            quota,
            summarizer,
            recovery,
            config,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Build a dispatcher backed by Redis and the Gemini client, configured
    /// from the environment. Waits for Redis with backoff.
    pub async fn from_env(config: DispatcherConfig) -> WorkerResult<Self> {
        config.validate()?;

        let queue_config = QueueConfig::from_env();
        let store = RedisWorkItemStore::new(&queue_config)?;
        let quota = RedisQuotaStore::new(&queue_config)?;

        let ping = RetryConfig::new("redis_ping").with_max_retries(5);
        retry_async(&ping, || store.ping()).await?;
        info!("Connected to Redis (prefix: {})", queue_config.key_prefix);

        let summarizer = GeminiSummarizer::from_env()?;
        info!("Summarizer model: {}", summarizer.model());

        Ok(Self::new(
            Arc::new(store),
            Arc::new(quota),
            Arc::new(summarizer),
            config,
        ))
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Release items left in `processing` by an interrupted cycle.
    pub async fn recover_stranded(&self, now: DateTime<Utc>) -> WorkerResult<u32> {
        let _guard = self
            .cycle_lock
            .try_lock()
            .map_err(|_| WorkerError::CycleInProgress)?;
        self.recovery.recover_once(now).await
    }

    /// Run one dispatch cycle for the UTC day containing `now`.
    ///
    /// Per-item failures are recorded on the item and never abort the cycle.
    /// Store errors do.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> WorkerResult<CycleReport> {
        let _guard = self
            .cycle_lock
            .try_lock()
            .map_err(|_| WorkerError::CycleInProgress)?;

        let started = Instant::now();
        let result = self.dispatch(now).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(report) => metrics::record_cycle(report, elapsed),
            Err(_) => metrics::record_cycle_error(),
        }
        result
    }

    async fn dispatch(&self, now: DateTime<Utc>) -> WorkerResult<CycleReport> {
        let day = quota_day(now);
        let limit = self.config.daily_limit;
        let mut report = CycleReport::new(day);

        report.recovered = self.recovery.recover_once(now).await?;

        let mut used = self.quota.get_count(day).await?;
        let remaining = limit.saturating_sub(used);
        if remaining == 0 {
            info!(day = %day, used, limit, "Daily quota already used up, nothing dispatched");
            report.stopped_reason = StopReason::QuotaExhausted;
            return self.finish(report).await;
        }

        let batch = remaining.min(self.config.batch_cap) as usize;
        let selected = self.store.list_pending(batch).await?;
        if selected.is_empty() {
            info!(day = %day, "No pending work items");
            report.stopped_reason = StopReason::NothingPending;
            return self.finish(report).await;
        }

        info!(
            day = %day,
            selected = selected.len(),
            used,
            limit,
            "Dispatching pending work items"
        );

        let total = selected.len();
        let mut attempted = 0usize;

        for item in selected {
            attempted += 1;

            match self.process_item(item, day).await? {
                ItemOutcome::Completed { counted: true } => {
                    report.completed += 1;
                    used += 1;
                    if used >= limit {
                        report.stopped_reason = StopReason::QuotaExhausted;
                        break;
                    }
                }
                ItemOutcome::Completed { counted: false } => {
                    report.completed += 1;
                    warn!(day = %day, "Quota counter already at limit, stopping cycle");
                    report.stopped_reason = StopReason::QuotaExhausted;
                    break;
                }
                ItemOutcome::Retried { remote_quota } => {
                    report.retried += 1;
                    if remote_quota && self.config.stop_on_remote_quota {
                        report.stopped_reason = StopReason::RemoteQuotaExhausted;
                        break;
                    }
                }
                ItemOutcome::Failed { remote_quota } => {
                    report.failed += 1;
                    if remote_quota && self.config.stop_on_remote_quota {
                        report.stopped_reason = StopReason::RemoteQuotaExhausted;
                        break;
                    }
                }
                ItemOutcome::Skipped => {}
            }
        }

        report.skipped_due_to_quota = (total - attempted) as u32;
        if report.skipped_due_to_quota > 0 {
            info!(
                day = %day,
                skipped = report.skipped_due_to_quota,
                reason = %report.stopped_reason,
                "Quota reached, leaving remaining items for a later cycle"
            );
        }

        self.finish(report).await
    }

    async fn finish(&self, mut report: CycleReport) -> WorkerResult<CycleReport> {
        report.quota_used = self.quota.get_count(report.day).await?;
        report.remaining_pending = self.store.count_pending().await?;
        Ok(report)
    }

    async fn process_item(&self, item: WorkItem, day: NaiveDate) -> WorkerResult<ItemOutcome> {
        let logger = ItemLogger::new(&item.id, "summarize");
        let span = logger.create_span();
        self.attempt_item(item, day, &logger).instrument(span).await
    }

    async fn attempt_item(
        &self,
        item: WorkItem,
        day: NaiveDate,
        logger: &ItemLogger,
    ) -> WorkerResult<ItemOutcome> {
        let Some(mut item) = self.store.claim(&item.id, Utc::now()).await? else {
            logger.log_warning("no longer pending, skipping");
            return Ok(ItemOutcome::Skipped);
        };

        logger.log_start(&format!(
            "attempt {} of {}",
            item.attempts + 1,
            self.config.max_attempts
        ));

        let started = Instant::now();
        let result = match tokio::time::timeout(
            self.config.call_timeout,
            self.summarizer.summarize(&item.request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SummarizerError::Timeout),
        };
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(summary) => {
                metrics::record_summarize_duration("success", elapsed);
                let counted = self
                    .quota
                    .increment_if_below(day, self.config.daily_limit)
                    .await?;

                item.complete(summary.text, self.config.max_attempts, Utc::now())?;
                self.store.update(&item).await?;
                logger.log_completion(&format!("summarized in {:.1}s", elapsed));

                Ok(ItemOutcome::Completed { counted })
            }
            Err(e) => {
                metrics::record_summarize_duration("failure", elapsed);
                let remote_quota = e.is_remote_quota();

                let outcome =
                    item.record_failure(e.to_string(), self.config.max_attempts, Utc::now())?;
                self.store.update(&item).await?;

                match outcome {
                    FailureOutcome::Retry => {
                        logger.log_warning(&format!(
                            "attempt {} failed, will retry on a later cycle: {}",
                            item.attempts, e
                        ));
                        Ok(ItemOutcome::Retried { remote_quota })
                    }
                    FailureOutcome::Exhausted => {
                        logger.log_error(&format!(
                            "giving up after {} attempts: {}",
                            item.attempts, e
                        ));
                        Ok(ItemOutcome::Failed { remote_quota })
                    }
                }
            }
        }
    }
}
