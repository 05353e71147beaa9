//! Scheduler configuration.

use std::time::Duration;

use strongbox_store::{DEFAULT_LIMIT_PAGING, PageRequest};

use crate::SchedulerError;

/// Default delay before the first check cycle, in seconds.
pub const DEFAULT_INITIAL_DELAY_SECS: f64 = 10.0;

/// Default base interval between check cycles, in seconds.
pub const DEFAULT_PERIODIC_INTERVAL_MAX_SECS: f64 = 10.0;

/// Configuration for a [`crate::PeriodicScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Delay before the first check cycle.
    pub initial_delay: Duration,
    /// Base interval fed to the interval policy.
    pub periodic_interval_max: Duration,
    /// Due records fetched per cycle.
    pub page_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs_f64(DEFAULT_INITIAL_DELAY_SECS),
            periodic_interval_max: Duration::from_secs_f64(DEFAULT_PERIODIC_INTERVAL_MAX_SECS),
            page_limit: DEFAULT_LIMIT_PAGING,
        }
    }
}

impl SchedulerConfig {
    /// Build a configuration from the two float-second options.
    pub fn from_secs(
        initial_delay_seconds: f64,
        periodic_interval_max_seconds: f64,
    ) -> Result<Self, SchedulerError> {
        Ok(Self {
            initial_delay: seconds("initial_delay_seconds", initial_delay_seconds)?,
            periodic_interval_max: seconds(
                "periodic_interval_max_seconds",
                periodic_interval_max_seconds,
            )?,
            page_limit: DEFAULT_LIMIT_PAGING,
        })
    }

    /// Set the number of due records fetched per cycle (cleaned to `1..=100`).
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = PageRequest::first(page_limit).limit;
        self
    }

    /// The page requested on each cycle.
    pub fn page(&self) -> PageRequest {
        PageRequest::first(self.page_limit)
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, SchedulerError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| SchedulerError::InvalidConfig(format!("{name} = {value}: {e}")))
}
