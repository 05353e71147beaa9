//! Task queue client for Strongbox.
//!
//! Retry records name the operation they want re-run by a string key. This
//! crate resolves those keys through an explicit registry of typed handlers
//! and casts the resulting calls over a transport.

mod args;
mod error;
mod orders;
mod registry;
mod transport;

pub use args::TaskArgs;
pub use error::QueueError;
pub use orders::{
    CHECK_CERTIFICATE_STATUS, ORDER_OPERATIONS, PROCESS_TYPE_ORDER, UPDATE_ORDER,
    order_task_registry,
};
pub use registry::{TaskFuture, TaskHandler, TaskQueueClient, TaskRegistry};
pub use transport::{CastTransport, HttpCastTransport};
