//! Per-record dispatch with one store transaction per record.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use strongbox_queue::{TaskArgs, TaskQueueClient};
use strongbox_store::{RecordStatus, RetryRecord, RetryTaskStore};

use crate::{DispatchError, DispatchOutcome};

/// Releases the store session when dropped, on every exit path.
struct SessionGuard<'a> {
    store: &'a dyn RetryTaskStore,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.store.clear();
    }
}

/// Re-dispatches single retry records.
///
/// A record is removed only when both the queue invocation and the store
/// commit succeed. If the commit fails after a successful invocation the
/// record is retried later and the operation runs again: delivery is
/// at-least-once, and queue operations must tolerate duplicates.
#[derive(Clone)]
pub struct RetryDispatcher {
    store: Arc<dyn RetryTaskStore>,
    queue: Arc<dyn TaskQueueClient>,
}

impl RetryDispatcher {
    pub fn new(store: Arc<dyn RetryTaskStore>, queue: Arc<dyn TaskQueueClient>) -> Self {
        Self { store, queue }
    }

    /// Dispatch one record. Failures are logged and rolled back, never returned.
    #[tracing::instrument(skip(self, record), fields(record_id = %record.id, task = %record.retry_task))]
    pub async fn dispatch(&self, mut record: RetryRecord) -> DispatchOutcome {
        let _session = SessionGuard {
            store: self.store.as_ref(),
        };

        match self.try_dispatch(&mut record).await {
            Ok(()) => {
                let (args, kwargs) = rendered_arguments(&record);
                debug!(
                    task = %record.retry_task,
                    args = %args,
                    kwargs = %kwargs,
                    "enqueued retry task"
                );
                DispatchOutcome::Dispatched
            }
            Err(e) => {
                let (args, kwargs) = rendered_arguments(&record);
                error!(
                    record_id = %record.id,
                    order_id = ?record.order_id,
                    task = %record.retry_task,
                    args = %args,
                    kwargs = %kwargs,
                    error = %e,
                    "problem enqueuing retry task"
                );
                if let Err(rollback_err) = self.store.rollback().await {
                    error!(record_id = %record.id, error = %rollback_err, "rollback failed");
                }
                DispatchOutcome::Failed
            }
        }
    }

    async fn try_dispatch(&self, record: &mut RetryRecord) -> Result<(), DispatchError> {
        let args = TaskArgs::new(record.retry_args.clone(), record.retry_kwargs.clone());
        self.queue.invoke(&record.retry_task, args).await?;

        record.status = RecordStatus::Active;
        self.store.delete(&record.id).await?;
        self.store.commit().await?;
        Ok(())
    }
}

/// Arguments as JSON text, for log fields.
fn rendered_arguments(record: &RetryRecord) -> (String, String) {
    (
        Value::from(record.retry_args.clone()).to_string(),
        Value::from(record.retry_kwargs.clone()).to_string(),
    )
}
