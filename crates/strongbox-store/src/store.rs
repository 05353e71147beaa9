//! The retry task store interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Fetched, PageRequest, RetryRecord, StoreError};

/// Persistent repository of pending retry records.
///
/// Writes (`insert`, `delete`) are staged and only become visible after
/// `commit`. There is one transaction boundary per store instance; the
/// scheduler dispatches records one at a time and closes the boundary after
/// each record.
#[async_trait]
pub trait RetryTaskStore: Send + Sync {
    /// Check that the backing storage is reachable. Called once before the
    /// scheduler starts; an error here aborts startup.
    async fn warm_up(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Fetch records with `created_at <= now`, oldest first.
    ///
    /// A store that cannot answer yet returns [`Fetched::Unavailable`];
    /// anything else that goes wrong is an error.
    async fn fetch_due(&self, now: DateTime<Utc>, page: PageRequest)
    -> Result<Fetched, StoreError>;

    /// All committed records, oldest first. Empty when not initialized.
    async fn list_all(&self) -> Result<Vec<RetryRecord>, StoreError>;

    /// Stage a new record.
    async fn insert(&self, record: RetryRecord) -> Result<(), StoreError>;

    /// Stage removal of a record.
    ///
    /// Fails with [`StoreError::NotFound`] if no committed record has this id
    /// or its removal is already staged.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Apply staged changes.
    async fn commit(&self) -> Result<(), StoreError>;

    /// Discard staged changes.
    async fn rollback(&self) -> Result<(), StoreError>;

    /// Release per-operation session state, discarding anything still staged.
    fn clear(&self);
}
