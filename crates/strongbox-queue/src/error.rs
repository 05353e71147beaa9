//! Error types for the task queue client.

use thiserror::Error;

/// Errors that can occur resolving or invoking a queue operation.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No handler is registered under this name.
    #[error("unknown task: {0}")]
    UnknownTask(String),

    /// A handler is already registered under this name.
    #[error("task already registered: {0}")]
    DuplicateTask(String),

    /// A required argument was not supplied.
    #[error("{task}: missing argument '{name}'")]
    MissingArgument { task: String, name: String },

    /// A named argument the operation does not accept.
    #[error("{task}: unexpected argument '{name}'")]
    UnexpectedArgument { task: String, name: String },

    /// An argument was supplied both positionally and by name.
    #[error("{task}: argument '{name}' given more than once")]
    DuplicateArgument { task: String, name: String },

    /// More positional arguments than the operation accepts.
    #[error("{task}: takes {expected} positional arguments but {given} were given")]
    TooManyArguments {
        task: String,
        expected: usize,
        given: usize,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The queue endpoint refused the cast.
    #[error("cast rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// A handler failed for its own reasons.
    #[error("task handler failed: {0}")]
    Handler(String),
}
