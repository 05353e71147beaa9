//! Order processing operations exposed to the retry scheduler.

use std::sync::Arc;

use crate::{CastTransport, QueueError, TaskArgs, TaskRegistry};

/// Process a newly submitted typed order.
pub const PROCESS_TYPE_ORDER: &str = "process_type_order";

/// Apply a metadata update to an existing order.
pub const UPDATE_ORDER: &str = "update_order";

/// Poll the certificate authority for an order's status.
pub const CHECK_CERTIFICATE_STATUS: &str = "check_certificate_status";

/// Every order operation with its parameters, in positional order.
pub const ORDER_OPERATIONS: &[(&str, &[&str])] = &[
    (PROCESS_TYPE_ORDER, &["order_id", "project_id", "request_id"]),
    (
        UPDATE_ORDER,
        &["order_id", "project_id", "updated_meta", "request_id"],
    ),
    (
        CHECK_CERTIFICATE_STATUS,
        &["order_id", "project_id", "request_id"],
    ),
];

/// Build a registry with every order operation cast over `transport`.
pub fn order_task_registry(transport: Arc<dyn CastTransport>) -> Result<TaskRegistry, QueueError> {
    let mut registry = TaskRegistry::new();

    for &(name, params) in ORDER_OPERATIONS {
        let transport = Arc::clone(&transport);
        registry.register(name, move |args: TaskArgs| {
            let transport = Arc::clone(&transport);
            async move {
                let kwargs = args.bind(name, params)?;
                transport.cast(name, kwargs).await
            }
        })?;
    }

    Ok(registry)
}
