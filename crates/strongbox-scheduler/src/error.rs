//! Error types for the scheduler.

use strongbox_queue::QueueError;
use strongbox_store::StoreError;
use thiserror::Error;

/// Errors that can surface from starting or stopping the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid scheduler configuration.
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    /// `start` was called while the loop is already running.
    #[error("retry scheduler is already running")]
    AlreadyRunning,

    /// Store error during startup.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The scheduler task panicked or could not be joined.
    #[error("scheduler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a single record could not be dispatched. Never escapes a cycle.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Resolving or invoking the queue operation failed.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Removing the record or committing failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
