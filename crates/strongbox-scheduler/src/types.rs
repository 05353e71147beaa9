//! Scheduler types.

use std::time::Duration;

/// Lifecycle of a scheduler instance. There is no paused or draining state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulerState {
    /// The loop is waiting or running a cycle.
    Running,
    /// The loop has not started or has exited.
    #[default]
    Stopped,
}

/// Result of dispatching one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Invoked, removed and committed.
    Dispatched,
    /// Something failed; the record stays for a later cycle.
    Failed,
}

/// Summary of one check cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Due records across all pages at fetch time.
    pub total: usize,
    /// Records dispatched and removed this cycle.
    pub dispatched: usize,
    /// Records whose dispatch failed this cycle.
    pub failed: usize,
    /// Delay chosen before the next cycle.
    pub next_delay: Duration,
}

impl CycleReport {
    /// Number of dispatch attempts made.
    pub fn attempted(&self) -> usize {
        self.dispatched + self.failed
    }
}
