//! Daemon command for running the retry scheduler.
//!
//! Wires a file-backed retry task store and the HTTP task queue into a
//! `PeriodicScheduler`, then runs it until Ctrl-C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use miette::Result;
use tracing::{info, warn};

use strongbox_queue::{HttpCastTransport, order_task_registry};
use strongbox_scheduler::{PeriodicScheduler, SchedulerConfig};
use strongbox_store::FileStore;

/// Configuration for the daemon.
pub struct DaemonConfig {
    pub store_path: PathBuf,
    pub queue_url: String,
    pub initial_delay_seconds: f64,
    pub periodic_interval_max_seconds: f64,
    pub page_limit: usize,
}

/// Run the retry scheduler until a shutdown signal arrives.
pub async fn run(config: DaemonConfig) -> Result<()> {
    let scheduler_config =
        SchedulerConfig::from_secs(config.initial_delay_seconds, config.periodic_interval_max_seconds)
            .map_err(|e| miette::miette!("{}", e))?
            .with_page_limit(config.page_limit);

    let store = Arc::new(FileStore::new(&config.store_path));

    let transport = HttpCastTransport::new(&config.queue_url)
        .map_err(|e| miette::miette!("failed to create task queue client: {}", e))?;
    let registry = order_task_registry(Arc::new(transport))
        .map_err(|e| miette::miette!("failed to register order tasks: {}", e))?;

    info!(
        store = %config.store_path.display(),
        queue = %config.queue_url,
        tasks = ?registry.names(),
        page_limit = scheduler_config.page_limit,
        "retry scheduler configured"
    );

    let scheduler = PeriodicScheduler::new(scheduler_config, store, Arc::new(registry));
    let handle = scheduler
        .start()
        .await
        .map_err(|e| miette::miette!("failed to start retry scheduler: {}", e))?;

    shutdown_signal().await;
    info!("received shutdown signal");

    handle
        .stop(true)
        .await
        .map_err(|e| miette::miette!("retry scheduler did not stop cleanly: {}", e))?;

    info!(
        cycles = scheduler.cycles_completed(),
        "retry scheduler shut down"
    );
    Ok(())
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
