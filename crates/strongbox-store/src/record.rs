//! Retry record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One deferred work item waiting to be re-dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryRecord {
    /// Unique identifier.
    pub id: String,
    /// When this record was created. A record is due once this has passed.
    pub created_at: DateTime<Utc>,
    /// Name of the queue operation to invoke.
    pub retry_task: String,
    /// Positional arguments for the operation.
    #[serde(default)]
    pub retry_args: Vec<Value>,
    /// Named arguments for the operation.
    #[serde(default)]
    pub retry_kwargs: Map<String, Value>,
    /// Lifecycle marker.
    #[serde(default)]
    pub status: RecordStatus,
    /// Order this retry belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Stored for operators; the scheduler never increments it.
    #[serde(default)]
    pub retry_count: u32,
}

/// Lifecycle of a retry record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// Waiting for a scheduler cycle to re-dispatch it.
    #[default]
    PendingRetry,
    /// Dispatched; the record can be removed.
    Active,
}

impl RetryRecord {
    /// Create a new pending record, due immediately.
    pub fn new(
        retry_task: impl Into<String>,
        retry_args: Vec<Value>,
        retry_kwargs: Map<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            retry_task: retry_task.into(),
            retry_args,
            retry_kwargs,
            status: RecordStatus::PendingRetry,
            order_id: None,
            retry_count: 0,
        }
    }

    /// Set the creation timestamp. Only meaningful before the record is stored.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Associate the record with an order.
    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Check if this record is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.created_at <= now
    }
}
