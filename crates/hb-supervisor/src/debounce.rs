//! Trailing-edge restart debouncing.
//!
//! Mirror writes notify the debouncer; any number of notifications within
//! the window produce exactly one restart after the window closes. Only one
//! timer is armed at a time, and each further notification re-arms it.
//! Serializing the restart itself is the supervisor's job, not the
//! debouncer's: notifications arriving mid-restart simply start a fresh
//! window.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::supervisor::SupervisorHandle;

/// A trailing-edge debouncer that fires the supervisor's restart entry.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use hb_supervisor::RestartDebouncer;
/// # fn example(supervisor: hb_supervisor::SupervisorHandle) {
/// let debouncer = RestartDebouncer::spawn(Duration::from_millis(300), supervisor);
/// let notify = debouncer.notifier();
/// notify.send(()).ok(); // restart follows 300ms later, once
/// # }
/// ```
#[derive(Debug)]
pub struct RestartDebouncer {
    notify_tx: mpsc::UnboundedSender<()>,
    _task: JoinHandle<()>,
}

impl RestartDebouncer {
    /// Spawns the debounce task with the given trailing window.
    #[must_use]
    pub fn spawn(window: Duration, supervisor: SupervisorHandle) -> Self {
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<()>();

        let task = tokio::spawn(async move {
            // Outer loop: wait for the first notification of a burst.
            while notify_rx.recv().await.is_some() {
                trace!("restart window armed");
                // Inner loop: re-arm while notifications keep arriving.
                loop {
                    match tokio::time::timeout(window, notify_rx.recv()).await {
                        Ok(Some(())) => trace!("restart window re-armed"),
                        Ok(None) => return,
                        Err(_elapsed) => break,
                    }
                }
                trace!("restart window elapsed");
                supervisor.restart();
            }
        });

        Self {
            notify_tx,
            _task: task,
        }
    }

    /// Returns a cloneable notification sender for the mirror pipeline.
    #[must_use]
    pub fn notifier(&self) -> mpsc::UnboundedSender<()> {
        self.notify_tx.clone()
    }
}
