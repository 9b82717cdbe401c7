//! Daily trigger for dispatch cycles.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::FailureTracker;

/// Consecutive failed cycles logged at error level before suppression.
const MAX_LOGGED_CYCLE_FAILURES: u32 = 3;

/// Fixed UTC wall-clock time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> WorkerResult<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(|time| Self { time })
            .ok_or_else(|| WorkerError::config_error(format!("Invalid run time {}:{}", hour, minute)))
    }

    /// First instant strictly after `now` with this wall-clock time.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.time).and_utc();
        if today > now {
            today
        } else {
            today + chrono::Duration::days(1)
        }
    }

    /// Next run after the scheduled run due at `last_due`. A wall clock that
    /// has stepped back behind `last_due` never yields that slot again.
    pub fn next_run_following(
        &self,
        last_due: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let from = last_due.map_or(now, |due| due.max(now));
        self.next_run_after(from)
    }
}

impl FromStr for DailySchedule {
    type Err = WorkerError;

    /// Parse "HH:MM".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WorkerError::config_error(format!("Run time must be HH:MM, got {:?}", s));

        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} UTC", self.time.format("%H:%M"))
    }
}

/// Runs one dispatch cycle per day until shut down.
pub struct Scheduler {
    dispatcher: Arc<Dispatcher>,
    schedule: DailySchedule,
    run_on_start: bool,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(dispatcher: Arc<Dispatcher>, schedule: DailySchedule, run_on_start: bool) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            dispatcher,
            schedule,
            run_on_start,
            shutdown,
        }
    }

    /// Signal shutdown. A cycle already running finishes first.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut failures = FailureTracker::new(MAX_LOGGED_CYCLE_FAILURES);

        info!("Starting scheduler (daily at {})", self.schedule);

        if self.run_on_start && !*shutdown_rx.borrow() {
            self.fire(&mut failures).await;
        }

        let mut last_due = None;
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let now = Utc::now();
            let next = self.schedule.next_run_following(last_due, now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, "Next dispatch cycle scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    last_due = Some(next);
                    self.fire(&mut failures).await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    async fn fire(&self, failures: &mut FailureTracker) {
        match self.dispatcher.run_cycle(Utc::now()).await {
            Ok(report) => {
                failures.record_success();
                info!(
                    day = %report.day,
                    completed = report.completed,
                    failed = report.failed,
                    retried = report.retried,
                    skipped_due_to_quota = report.skipped_due_to_quota,
                    remaining_pending = report.remaining_pending,
                    stopped_reason = %report.stopped_reason,
                    "Dispatch cycle finished"
                );
            }
            Err(WorkerError::CycleInProgress) => {
                warn!("Skipping scheduled cycle: previous cycle still running");
            }
            Err(e) => {
                if failures.record_failure() {
                    error!(retryable = e.is_retryable(), "Dispatch cycle failed: {}", e);
                }
            }
        }
    }
}
