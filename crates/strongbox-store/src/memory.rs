//! In-memory retry task store.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{DuePage, Fetched, PageRequest, RetryRecord, RetryTaskStore, StoreError};

/// A staged write.
#[derive(Debug, Clone)]
pub(crate) enum Change {
    Insert(RetryRecord),
    Delete(String),
}

/// Apply staged changes to a committed record list, keeping it sorted by
/// creation time.
pub(crate) fn apply_changes(records: &mut Vec<RetryRecord>, changes: Vec<Change>) {
    for change in changes {
        match change {
            Change::Insert(record) => {
                records.retain(|r| r.id != record.id);
                records.push(record);
            }
            Change::Delete(id) => records.retain(|r| r.id != id),
        }
    }
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
}

/// Whether `id` can be staged for removal.
pub(crate) fn check_deletable(
    records: &[RetryRecord],
    staged: &[Change],
    id: &str,
) -> Result<(), StoreError> {
    let committed = records.iter().any(|r| r.id == id);
    let already_staged = staged
        .iter()
        .any(|c| matches!(c, Change::Delete(staged_id) if staged_id == id));

    if committed && !already_staged {
        Ok(())
    } else {
        Err(StoreError::NotFound(id.to_string()))
    }
}

/// Records with `created_at <= now`, oldest first.
pub(crate) fn due_records(records: &[RetryRecord], now: DateTime<Utc>) -> Vec<RetryRecord> {
    let mut due: Vec<RetryRecord> = records.iter().filter(|r| r.is_due(now)).cloned().collect();
    due.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    due
}

#[derive(Debug, Default)]
struct Inner {
    ready: bool,
    records: Vec<RetryRecord>,
    staged: Vec<Change>,
}

/// Retry task store held in process memory.
///
/// Useful for tests and single-node setups. A store built with
/// [`MemoryStore::warming`] reports itself unavailable until
/// [`MemoryStore::mark_ready`] is called.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store that is ready immediately.
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Create a ready store holding `records` as committed state.
    pub fn with_records(records: Vec<RetryRecord>) -> Self {
        let mut committed = Vec::new();
        apply_changes(&mut committed, records.into_iter().map(Change::Insert).collect());

        Self {
            inner: Mutex::new(Inner {
                ready: true,
                records: committed,
                staged: Vec::new(),
            }),
        }
    }

    /// Create a store that is not yet ready.
    pub fn warming() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Mark a warming store ready.
    pub fn mark_ready(&self) {
        self.lock().ready = true;
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Check if the store holds no committed records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a committed record with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().records.iter().any(|r| r.id == id)
    }

    /// Number of staged, uncommitted changes.
    pub fn staged_len(&self) -> usize {
        self.lock().staged.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves `Inner` consistent, so a poisoned
        // lock is still safe to use.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RetryTaskStore for MemoryStore {
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Fetched, StoreError> {
        let inner = self.lock();
        if !inner.ready {
            return Ok(Fetched::Unavailable {
                reason: "memory store is still warming".to_string(),
            });
        }

        Ok(Fetched::Due(DuePage::from_sorted(
            due_records(&inner.records, now),
            page,
        )))
    }

    async fn list_all(&self) -> Result<Vec<RetryRecord>, StoreError> {
        Ok(self.lock().records.clone())
    }

    async fn insert(&self, record: RetryRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.ready {
            return Err(StoreError::NotInitialized);
        }
        inner.staged.push(Change::Insert(record));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.ready {
            return Err(StoreError::NotInitialized);
        }
        check_deletable(&inner.records, &inner.staged, id)?;
        inner.staged.push(Change::Delete(id.to_string()));
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.ready {
            return Err(StoreError::NotInitialized);
        }
        let changes = std::mem::take(&mut inner.staged);
        debug!(changes = changes.len(), "committing staged retry record changes");
        apply_changes(&mut inner.records, changes);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.lock().staged.clear();
        Ok(())
    }

    fn clear(&self) {
        self.lock().staged.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use serde_json::Map;

    fn record_at(offset_secs: i64) -> RetryRecord {
        RetryRecord::new("process_type_order", vec![], Map::new())
            .with_created_at(Utc::now() + Duration::seconds(offset_secs))
    }

    #[tokio::test]
    async fn test_fetch_due_excludes_future_records() {
        let past = record_at(-60);
        let future = record_at(3600);
        let store = MemoryStore::with_records(vec![future, past.clone()]);

        let page = store
            .fetch_due(Utc::now(), PageRequest::default())
            .await
            .unwrap()
            .or_empty();

        assert_eq!(page.total_count, 1);
        assert_eq!(page.records, vec![past]);
    }

    #[tokio::test]
    async fn test_fetch_due_oldest_first() {
        let a = record_at(-10);
        let b = record_at(-30);
        let c = record_at(-20);
        let store = MemoryStore::with_records(vec![a.clone(), b.clone(), c.clone()]);

        let page = store
            .fetch_due(Utc::now(), PageRequest::default())
            .await
            .unwrap()
            .or_empty();

        let ids: Vec<_> = page.records.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);
    }

    #[tokio::test]
    async fn test_warming_store_is_unavailable() {
        let store = MemoryStore::warming();

        let fetched = store
            .fetch_due(Utc::now(), PageRequest::default())
            .await
            .unwrap();
        assert!(fetched.is_unavailable());

        let page = fetched.or_empty();
        assert!(page.records.is_empty());
        assert_eq!(page.total_count, 0);

        assert!(matches!(
            store.delete("anything").await,
            Err(StoreError::NotInitialized)
        ));

        store.mark_ready();
        assert!(
            !store
                .fetch_due(Utc::now(), PageRequest::default())
                .await
                .unwrap()
                .is_unavailable()
        );
    }

    #[tokio::test]
    async fn test_delete_requires_commit() {
        let record = record_at(-1);
        let store = MemoryStore::with_records(vec![record.clone()]);

        store.delete(&record.id).await.unwrap();
        assert!(store.contains(&record.id));

        store.commit().await.unwrap();
        assert!(!store.contains(&record.id));
    }

    #[tokio::test]
    async fn test_rollback_discards_delete() {
        let record = record_at(-1);
        let store = MemoryStore::with_records(vec![record.clone()]);

        store.delete(&record.id).await.unwrap();
        store.rollback().await.unwrap();
        store.commit().await.unwrap();

        assert!(store.contains(&record.id));
    }

    #[tokio::test]
    async fn test_clear_discards_staged_changes() {
        let store = MemoryStore::new();
        store.insert(record_at(-1)).await.unwrap();
        assert_eq!(store.staged_len(), 1);

        store.clear();
        store.commit().await.unwrap();

        assert_eq!(store.staged_len(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.delete("missing").await,
            Err(StoreError::NotFound(id)) if id == "missing"
        ));
    }

    #[tokio::test]
    async fn test_second_delete_of_same_record_is_not_found() {
        let record = record_at(-1);
        let store = MemoryStore::with_records(vec![record.clone()]);

        store.delete(&record.id).await.unwrap();
        assert!(matches!(
            store.delete(&record.id).await,
            Err(StoreError::NotFound(_))
        ));

        store.commit().await.unwrap();
        assert!(matches!(
            store.delete(&record.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_only_target() {
        let keep = record_at(-20);
        let remove = record_at(-10);
        let store = MemoryStore::with_records(vec![keep.clone(), remove.clone()]);

        store.delete(&remove.id).await.unwrap();
        store.commit().await.unwrap();

        assert_eq!(store.list_all().await.unwrap(), vec![keep]);
    }
}
