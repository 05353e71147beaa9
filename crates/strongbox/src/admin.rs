//! Operator commands for inspecting and editing the retry task store.

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use strongbox_queue::{ORDER_OPERATIONS, QueueError, TaskArgs};
use strongbox_store::{FileStore, RetryRecord, RetryTaskStore, StoreError};

/// Errors from operator commands.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid {field}: {message}")]
    InvalidJson { field: &'static str, message: String },

    #[error("unknown task {name}, expected one of: {known}")]
    UnknownTask { name: String, known: String },

    #[error(transparent)]
    Arguments(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A validated request to store a new retry record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    pub task: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub order_id: Option<String>,
}

impl ScheduleRequest {
    /// Parse the command-line form and check the arguments bind to the task.
    pub fn parse(
        task: &str,
        args: &str,
        kwargs: &str,
        order_id: Option<String>,
    ) -> Result<Self, AdminError> {
        let params = ORDER_OPERATIONS
            .iter()
            .find(|(name, _)| *name == task)
            .map(|(_, params)| *params)
            .ok_or_else(|| AdminError::UnknownTask {
                name: task.to_string(),
                known: ORDER_OPERATIONS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        let args: Vec<Value> = serde_json::from_str(args).map_err(|e| AdminError::InvalidJson {
            field: "args",
            message: e.to_string(),
        })?;
        let kwargs: Map<String, Value> =
            serde_json::from_str(kwargs).map_err(|e| AdminError::InvalidJson {
                field: "kwargs",
                message: e.to_string(),
            })?;

        // Reject now what the queue would reject on every retry
        TaskArgs::new(args.clone(), kwargs.clone()).bind(task, params)?;

        Ok(Self {
            task: task.to_string(),
            args,
            kwargs,
            order_id,
        })
    }
}

/// Every committed record, oldest first. A missing store file lists nothing.
pub async fn list(store_path: &Path) -> Result<Vec<RetryRecord>, AdminError> {
    Ok(FileStore::new(store_path).list_all().await?)
}

/// Remove one record without dispatching it.
pub async fn purge(store_path: &Path, id: &str) -> Result<(), AdminError> {
    let store = FileStore::new(store_path);
    store.warm_up().await?;

    let result = remove(&store, id).await;
    store.clear();
    result?;

    info!(record_id = id, "purged retry record");
    Ok(())
}

async fn remove(store: &FileStore, id: &str) -> Result<(), StoreError> {
    if let Err(e) = store.delete(id).await {
        store.rollback().await?;
        return Err(e);
    }
    store.commit().await
}

/// Store a record for `request`, creating the store file if needed.
///
/// Returns the new record's id.
pub async fn schedule(store_path: &Path, request: ScheduleRequest) -> Result<String, AdminError> {
    let store = FileStore::new(store_path);
    store.initialize().await?;

    let mut record = RetryRecord::new(request.task, request.args, request.kwargs);
    if let Some(order_id) = request.order_id {
        record = record.with_order_id(order_id);
    }
    let id = record.id.clone();

    store.insert(record).await?;
    store.commit().await?;

    info!(record_id = %id, "scheduled retry record");
    Ok(id)
}
