//! JSON file-backed retry task store.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::memory::{Change, apply_changes, check_deletable, due_records};
use crate::{DuePage, Fetched, PageRequest, RetryRecord, RetryTaskStore, StoreError};

/// Current on-disk document version.
const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    records: Vec<RetryRecord>,
}

/// Retry task store persisted as a single JSON document.
///
/// The file is created by [`FileStore::initialize`]; until then the store
/// reports itself unavailable. Writers take an exclusive lock on a sidecar
/// `<path>.lock` file, re-read the document, apply their changes and
/// atomically replace it, so commits from other handles or processes are
/// never lost. Readers take no lock.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    staged: Mutex<Vec<Change>>,
}

impl FileStore {
    /// Open a store at `path`. Does not touch the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            staged: Mutex::new(Vec::new()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sidecar file writers lock.
    pub fn lock_path(&self) -> PathBuf {
        lock_path(&self.path)
    }

    /// Create an empty store file if none exists.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let path = self.path.clone();
        let created = blocking(move || {
            with_write_lock(&path, || {
                if load_document(&path)?.is_some() {
                    return Ok(false);
                }
                store_document(
                    &path,
                    &StoreDocument {
                        version: DOCUMENT_VERSION,
                        records: Vec::new(),
                    },
                )?;
                Ok(true)
            })
        })
        .await?;

        if created {
            info!(path = %self.path.display(), "initialized retry task store");
        }
        Ok(())
    }

    async fn read_document(&self) -> Result<Option<StoreDocument>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        parse_document(&self.path, &bytes).map(Some)
    }

    fn staged(&self) -> MutexGuard<'_, Vec<Change>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Run blocking filesystem work off the async worker threads.
async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(std::io::Error::other)?
}

/// Run `f` while holding the exclusive writer lock for `path`.
///
/// The lock lives on a sidecar file because the document itself is
/// replaced by rename on every write. It is released when the handle drops.
fn with_write_lock<T>(
    path: &Path,
    f: impl FnOnce() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let lock_file: File = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path(path))?;
    lock_file.lock_exclusive()?;
    f()
}

fn parse_document(path: &Path, bytes: &[u8]) -> Result<StoreDocument, StoreError> {
    let document: StoreDocument = serde_json::from_slice(bytes)?;
    if document.version != DOCUMENT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported document version {} in {}",
            document.version,
            path.display()
        )));
    }
    Ok(document)
}

fn load_document(path: &Path) -> Result<Option<StoreDocument>, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) => parse_document(path, &bytes).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn store_document(path: &Path, document: &StoreDocument) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(document)?;
    write_atomic(path, &bytes)
}

/// Write `bytes` to a temp file next to `path`, then rename it into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl RetryTaskStore for FileStore {
    async fn warm_up(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let metadata = tokio::fs::metadata(&dir).await?;
        if !metadata.is_dir() {
            return Err(StoreError::Corrupt(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        // Surface a corrupt file at startup rather than on the first cycle.
        self.read_document().await?;
        Ok(())
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Fetched, StoreError> {
        match self.read_document().await? {
            Some(document) => Ok(Fetched::Due(DuePage::from_sorted(
                due_records(&document.records, now),
                page,
            ))),
            None => Ok(Fetched::Unavailable {
                reason: format!("{} does not exist yet", self.path.display()),
            }),
        }
    }

    async fn list_all(&self) -> Result<Vec<RetryRecord>, StoreError> {
        let mut records = self
            .read_document()
            .await?
            .map(|d| d.records)
            .unwrap_or_default();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn insert(&self, record: RetryRecord) -> Result<(), StoreError> {
        if self.read_document().await?.is_none() {
            return Err(StoreError::NotInitialized);
        }
        self.staged().push(Change::Insert(record));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let document = self
            .read_document()
            .await?
            .ok_or(StoreError::NotInitialized)?;

        let mut staged = self.staged();
        check_deletable(&document.records, &staged, id)?;
        staged.push(Change::Delete(id.to_string()));
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let changes = std::mem::take(&mut *self.staged());
        if changes.is_empty() {
            return Ok(());
        }

        debug!(changes = changes.len(), path = %self.path.display(), "committing retry record changes");

        let path = self.path.clone();
        blocking(move || {
            with_write_lock(&path, || {
                let mut document = load_document(&path)?.ok_or(StoreError::NotInitialized)?;
                apply_changes(&mut document.records, changes);
                store_document(&path, &document)
            })
        })
        .await
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.staged().clear();
        Ok(())
    }

    fn clear(&self) {
        self.staged().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::{Map, json};

    fn record_at(offset_secs: i64) -> RetryRecord {
        RetryRecord::new("check_certificate_status", vec![json!("order-1")], Map::new())
            .with_created_at(Utc::now() + Duration::seconds(offset_secs))
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("retry.json"));

        let fetched = store
            .fetch_due(Utc::now(), PageRequest::default())
            .await
            .unwrap();
        assert!(fetched.is_unavailable());
        assert_eq!(fetched.or_empty().total_count, 0);

        assert!(store.list_all().await.unwrap().is_empty());
        assert!(matches!(
            store.insert(record_at(-1)).await,
            Err(StoreError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("retry.json"));

        store.initialize().await.unwrap();
        store.insert(record_at(-1)).await.unwrap();
        store.commit().await.unwrap();

        store.initialize().await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.json");
        let record = record_at(-5);

        let store = FileStore::new(&path);
        store.initialize().await.unwrap();
        store.insert(record.clone()).await.unwrap();
        store.commit().await.unwrap();

        let reopened = FileStore::new(&path);
        let page = reopened
            .fetch_due(Utc::now(), PageRequest::default())
            .await
            .unwrap()
            .or_empty();
        assert_eq!(page.records, vec![record]);
    }

    #[tokio::test]
    async fn test_rollback_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("retry.json"));
        store.initialize().await.unwrap();

        let record = record_at(-5);
        store.insert(record.clone()).await.unwrap();
        store.commit().await.unwrap();

        store.delete(&record.id).await.unwrap();
        store.rollback().await.unwrap();
        store.commit().await.unwrap();

        assert_eq!(store.list_all().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_delete_already_removed_by_other_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.json");
        let record = record_at(-5);

        let first = FileStore::new(&path);
        first.initialize().await.unwrap();
        first.insert(record.clone()).await.unwrap();
        first.commit().await.unwrap();

        let second = FileStore::new(&path);
        second.delete(&record.id).await.unwrap();
        second.commit().await.unwrap();

        assert!(matches!(
            first.delete(&record.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_from_separate_handles_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.json");
        FileStore::new(&path).initialize().await.unwrap();

        let writers: Vec<_> = (0..32)
            .map(|i| {
                let path = path.clone();
                tokio::spawn(async move {
                    let store = FileStore::new(path);
                    let record = record_at(-i);
                    let id = record.id.clone();
                    store.insert(record).await.unwrap();
                    store.commit().await.unwrap();
                    id
                })
            })
            .collect();

        let mut ids = Vec::new();
        for writer in writers {
            ids.push(writer.await.unwrap());
        }

        let stored = FileStore::new(&path).list_all().await.unwrap();
        assert_eq!(stored.len(), 32);
        for id in &ids {
            assert!(stored.iter().any(|r| &r.id == id), "lost record {id}");
        }
        assert!(FileStore::new(&path).lock_path().exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_delete_and_insert_keep_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.json");
        let existing = record_at(-60);

        let seed = FileStore::new(&path);
        seed.initialize().await.unwrap();
        seed.insert(existing.clone()).await.unwrap();
        seed.commit().await.unwrap();

        let remover = FileStore::new(&path);
        remover.delete(&existing.id).await.unwrap();

        let added = record_at(-5);
        let inserter = FileStore::new(&path);
        inserter.insert(added.clone()).await.unwrap();

        let (removed, inserted) = tokio::join!(
            tokio::spawn(async move { remover.commit().await }),
            tokio::spawn(async move { inserter.commit().await }),
        );
        removed.unwrap().unwrap();
        inserted.unwrap().unwrap();

        let stored = FileStore::new(&path).list_all().await.unwrap();
        assert_eq!(stored, vec![added]);
    }

    #[test]
    fn test_lock_path_is_sidecar() {
        let store = FileStore::new("/var/lib/strongbox/retry.json");
        assert_eq!(
            store.lock_path(),
            PathBuf::from("/var/lib/strongbox/retry.json.lock")
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.fetch_due(Utc::now(), PageRequest::default()).await,
            Err(StoreError::Json(_))
        ));
        assert!(store.warm_up().await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_version_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.json");
        tokio::fs::write(&path, br#"{"version": 99, "records": []}"#)
            .await
            .unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.list_all().await, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_warm_up_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent").join("retry.json"));
        assert!(matches!(store.warm_up().await, Err(StoreError::Io(_))));
    }
}
