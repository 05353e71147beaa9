//! Error types for retry task storage.

use thiserror::Error;

/// Errors that can occur in store operations.
///
/// A store that is not yet warmed is reported by `fetch_due` as
/// [`crate::Fetched::Unavailable`], not as an error. Write paths on such a
/// store fail with [`StoreError::NotInitialized`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id exists (or it is already staged for removal).
    #[error("retry record not found: {0}")]
    NotFound(String),

    /// A write was attempted before the store was initialized.
    #[error("retry task store is not initialized")]
    NotInitialized,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored data is structurally invalid.
    #[error("corrupt store: {0}")]
    Corrupt(String),
}
