//! Periodic retry scheduler implementation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use strongbox_queue::TaskQueueClient;
use strongbox_store::{Fetched, RetryTaskStore};

use crate::{
    CycleReport, DispatchOutcome, IntervalPolicy, RetryDispatcher, SchedulerConfig,
    SchedulerError, SchedulerState,
};

struct Inner {
    config: SchedulerConfig,
    store: Arc<dyn RetryTaskStore>,
    dispatcher: RetryDispatcher,
    policy: IntervalPolicy,
    running: AtomicBool,
    cycles: AtomicU64,
}

/// Holds the running flag; clears it when dropped, including on abort.
struct RunningGuard {
    inner: Arc<Inner>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }
}

/// Background process that re-dispatches due retry records.
///
/// Runs one check cycle at a time. The delay before each cycle is chosen
/// after the previous one finishes, so a slow cycle pushes the next one back.
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct PeriodicScheduler {
    inner: Arc<Inner>,
}

impl PeriodicScheduler {
    /// Create a new scheduler.
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn RetryTaskStore>,
        queue: Arc<dyn TaskQueueClient>,
    ) -> Self {
        let dispatcher = RetryDispatcher::new(Arc::clone(&store), queue);

        Self {
            inner: Arc::new(Inner {
                config,
                store,
                dispatcher,
                policy: IntervalPolicy::new(config.periodic_interval_max),
                running: AtomicBool::new(false),
                cycles: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        if self.inner.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Number of check cycles completed since creation.
    pub fn cycles_completed(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    /// Warm up the store and spawn the scheduler loop.
    ///
    /// Fails if the loop is already running or the store cannot be reached.
    pub async fn start(&self) -> Result<SchedulerHandle, SchedulerError> {
        let running = self.claim()?;
        info!("starting the retry scheduler");

        if let Err(e) = self.inner.store.warm_up().await {
            error!(error = %e, "retry task store failed to warm up");
            return Err(e.into());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = self.clone();
        let task = tokio::spawn(async move {
            let _running = running;
            scheduler.run_loop(shutdown_rx).await
        });

        Ok(SchedulerHandle {
            scheduler: self.clone(),
            shutdown_tx,
            task,
        })
    }

    /// Run the scheduler loop in the current task until `shutdown_rx` turns true.
    ///
    /// A stop request never interrupts a cycle in progress: every record
    /// fetched by that cycle is attempted before the loop exits. The store
    /// is not warmed up here. Fails with `AlreadyRunning` if a loop started
    /// by [`PeriodicScheduler::start`] or another `run_until` is live.
    pub async fn run_until(&self, shutdown_rx: watch::Receiver<bool>) -> Result<(), SchedulerError> {
        let _running = self.claim()?;
        self.run_loop(shutdown_rx).await;
        Ok(())
    }

    /// Set the running flag, failing if it is already set.
    fn claim(&self) -> Result<RunningGuard, SchedulerError> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| RunningGuard {
                inner: Arc::clone(&self.inner),
            })
            .map_err(|_| SchedulerError::AlreadyRunning)
    }

    /// The loop body. The caller holds the running flag.
    async fn run_loop(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let initial_delay = self.inner.config.initial_delay;
        info!(
            initial_delay_secs = initial_delay.as_secs_f64(),
            interval_secs = self.inner.policy.base_interval().as_secs_f64(),
            "retry scheduler running"
        );

        let mut delay = initial_delay;
        while wait_or_stop(delay, &mut shutdown_rx).await {
            delay = self.check_cycle().await.next_delay;
        }

        info!("retry scheduler stopped");
    }

    /// Run one check cycle: fetch due records, dispatch each, pick the next delay.
    #[tracing::instrument(skip(self))]
    pub async fn check_cycle(&self) -> CycleReport {
        info!("processing scheduled retry tasks");

        let now = Utc::now();
        let page = match self.inner.store.fetch_due(now, self.inner.config.page()).await {
            Ok(fetched) => {
                if let Fetched::Unavailable { reason } = &fetched {
                    warn!(reason = %reason, "retry task store unavailable, nothing to process");
                }
                fetched.or_empty()
            }
            Err(e) => {
                error!(error = %e, "failed to fetch due retry tasks");
                Default::default()
            }
        };

        let total = page.total_count;
        let mut dispatched = 0;
        let mut failed = 0;

        for record in page.records {
            match self.inner.dispatcher.dispatch(record).await {
                DispatchOutcome::Dispatched => dispatched += 1,
                DispatchOutcome::Failed => failed += 1,
            }
        }

        let next_delay = self.inner.policy.compute_next_delay();
        self.inner.cycles.fetch_add(1, Ordering::SeqCst);

        info!(
            total,
            dispatched,
            failed,
            next_delay_secs = next_delay.as_secs_f64(),
            "done processing retry tasks"
        );

        CycleReport {
            total,
            dispatched,
            failed,
            next_delay,
        }
    }
}

/// Sleep for `delay` unless a stop is requested first.
///
/// Returns `false` if the loop should exit. A dropped sender counts as a stop.
async fn wait_or_stop(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    if *shutdown_rx.borrow() {
        return false;
    }

    tokio::select! {
        _ = sleep(delay) => !*shutdown_rx.borrow(),
        _ = stop_requested(shutdown_rx) => false,
    }
}

/// Resolve once a stop is requested or the sender is gone.
async fn stop_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

impl fmt::Debug for PeriodicScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicScheduler")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .field("cycles_completed", &self.cycles_completed())
            .finish()
    }
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    scheduler: PeriodicScheduler,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("scheduler", &self.scheduler)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl SchedulerHandle {
    /// The scheduler this handle controls.
    pub fn scheduler(&self) -> &PeriodicScheduler {
        &self.scheduler
    }

    /// Check if the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop.
    ///
    /// With `graceful`, waits for an in-flight cycle to finish. Otherwise the
    /// loop is aborted; a record whose dispatch is cut short has not been
    /// committed and stays in the store.
    pub async fn stop(self, graceful: bool) -> Result<(), SchedulerError> {
        info!(graceful, "halting the retry scheduler");
        // The loop may already have exited; nothing to signal then
        let _ = self.shutdown_tx.send(true);

        if !graceful {
            self.task.abort();
        }

        match self.task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
