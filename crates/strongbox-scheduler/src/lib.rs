//! Periodic retry scheduler for Strongbox.
//!
//! This crate provides a background scheduler that:
//! - Wakes on a jittered dynamic timer
//! - Fetches due retry records from a `RetryTaskStore`
//! - Re-dispatches each one through a `TaskQueueClient`, one transaction per record
//! - Keeps failed records for the next cycle, with no attempt ceiling

mod config;
mod dispatcher;
mod error;
mod interval;
mod scheduler;
mod types;

pub use config::{DEFAULT_INITIAL_DELAY_SECS, DEFAULT_PERIODIC_INTERVAL_MAX_SECS, SchedulerConfig};
pub use dispatcher::RetryDispatcher;
pub use error::{DispatchError, SchedulerError};
pub use interval::IntervalPolicy;
pub use scheduler::{PeriodicScheduler, SchedulerHandle};
pub use types::{CycleReport, DispatchOutcome, SchedulerState};
