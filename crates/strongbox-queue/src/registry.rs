//! Name-to-handler registry for queue operations.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use tracing::debug;

use crate::{QueueError, TaskArgs};

/// Future returned by a task handler.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send>>;

/// Type alias for a registered task handler.
pub type TaskHandler = Box<dyn Fn(TaskArgs) -> TaskFuture + Send + Sync>;

/// Something that can resolve an operation name and invoke it.
///
/// Invocation is fire-and-forget: a handler reports success or failure and
/// nothing else.
#[async_trait]
pub trait TaskQueueClient: Send + Sync {
    /// Look up the handler for `name`.
    fn resolve(&self, name: &str) -> Result<&TaskHandler, QueueError>;

    /// Resolve `name` and run its handler with `args`.
    async fn invoke(&self, name: &str, args: TaskArgs) -> Result<(), QueueError> {
        let handler = self.resolve(name)?;
        debug!(task = name, "invoking queue operation");
        handler(args).await
    }
}

/// Registry of named operations, populated at startup.
#[derive(Default)]
pub struct TaskRegistry {
    handlers: HashMap<String, TaskHandler>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> Result<(), QueueError>
    where
        F: Fn(TaskArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), QueueError>> + Send + 'static,
    {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(QueueError::DuplicateTask(name));
        }

        let handler: TaskHandler = Box::new(move |args| Box::pin(handler(args)));
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Check if an operation is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered operation names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

impl TaskQueueClient for TaskRegistry {
    fn resolve(&self, name: &str) -> Result<&TaskHandler, QueueError> {
        self.handlers
            .get(name)
            .ok_or_else(|| QueueError::UnknownTask(name.to_string()))
    }
}
