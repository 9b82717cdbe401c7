//! Daily quota-bounded summarization dispatcher.
//!
//! Once per day the dispatcher takes pending work items oldest-first, sends
//! up to the remaining daily quota to the summarization API, records each
//! outcome, and leaves the rest for the next day.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod recovery;
pub mod retry;
pub mod scheduler;


pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::{WorkerError, WorkerResult};
pub use logging::ItemLogger;
pub use recovery::StrandedItemRecovery;
pub use retry::{retry_async, FailureTracker, RetryConfig};
pub use scheduler::{DailySchedule, Scheduler};
