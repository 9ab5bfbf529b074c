//! Background snapshot refresh
//!
//! A refresh waits a short settling delay, then polls the statistics source
//! until it returns a snapshot that differs from the one that was current
//! when polling began, and installs it. Only one refresh task runs per cache;
//! it can be cancelled through a shutdown channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CachedSnapshot;
use crate::data::StatsSource;

/// Timing of the refresh poll loop
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Wait before the first poll, so a refresh requested right after
    /// construction does not immediately refetch the same run
    pub settle_delay: Duration,
    /// Wait between polls that returned unchanged data
    pub poll_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(300),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Result of asking the cache to refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new refresh task was spawned
    Started,
    /// A refresh task was already active; the request joins it
    AlreadyRunning,
}

/// Handle to a spawned refresh task
pub(crate) struct RefreshTask {
    /// Signals the task to stop
    shutdown_tx: mpsc::Sender<()>,
    /// Set once the task is asked to stop; it must not store anything after
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Spawns the poll loop on `runtime`
    pub(crate) fn spawn(
        runtime: &Handle,
        source: Arc<dyn StatsSource>,
        current: Arc<ArcSwap<CachedSnapshot>>,
        config: RefreshConfig,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let task_cancelled = Arc::clone(&cancelled);

        let handle = runtime.spawn(async move {
            poll_until_changed(
                source.as_ref(),
                &current,
                &config,
                &mut shutdown_rx,
                &task_cancelled,
            )
            .await;
        });

        Self {
            shutdown_tx,
            cancelled,
            handle,
        }
    }

    /// Whether the poll loop is still active and has not been cancelled
    pub(crate) fn is_running(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst) && !self.handle.is_finished()
    }

    /// Stops the poll loop.
    ///
    /// The task counts as stopped immediately; it exits at its next wait or
    /// fetch. Returns `false` if it had already exited or been cancelled.
    pub(crate) fn cancel(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        // A full channel means a stop signal is already pending
        let _ = self.shutdown_tx.try_send(());
        true
    }
}

/// Polls `source` until it yields a snapshot different from the one current
/// at the start, then stores it in `current`.
///
/// Fetch failures are logged and treated like unchanged data. A message on
/// `shutdown_rx`, the sender being dropped, or `cancelled` being set ends the
/// loop without touching `current`.
pub(crate) async fn poll_until_changed(
    source: &dyn StatsSource,
    current: &ArcSwap<CachedSnapshot>,
    config: &RefreshConfig,
    shutdown_rx: &mut mpsc::Receiver<()>,
    cancelled: &AtomicBool,
) {
    tokio::select! {
        _ = tokio::time::sleep(config.settle_delay) => {}
        _ = shutdown_rx.recv() => {
            debug!("refresh cancelled during settling delay");
            return;
        }
    }

    let old = current.load_full();
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;

        let fetched = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                debug!(attempts, "refresh cancelled during fetch");
                return;
            }
            result = source.fetch() => result,
        };
        if cancelled.load(Ordering::SeqCst) {
            debug!(attempts, "refresh cancelled after fetch");
            return;
        }

        match fetched {
            Ok(candidate) if candidate != *old.snapshot => {
                let countries = candidate.countries.len();
                current.store(Arc::new(CachedSnapshot::new(candidate)));
                info!(attempts, countries, "statistics updated");
                return;
            }
            Ok(_) => debug!(attempts, "statistics unchanged"),
            Err(e) => warn!(attempts, error = %e, "refresh fetch failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval) => {}
            _ = shutdown_rx.recv() => {
                debug!(attempts, "refresh cancelled");
                return;
            }
        }
    }
}
