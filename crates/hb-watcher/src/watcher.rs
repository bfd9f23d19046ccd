//! File watcher with async event streaming.
//!
//! [`FileWatcher`] bridges the synchronous `notify` crate to the tokio
//! runtime: a blocking task runs the debounced watcher and forwards filtered
//! events over an mpsc channel. One watcher is created per source root; all
//! of them feed the single mirror pipeline.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use hb_core::WatchConfig;

use crate::error::WatchError;
use crate::events::FileEvent;
use crate::filter::FileFilter;

/// Default channel capacity for file events.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// A file watcher that streams events for one source root.
///
/// # Lifecycle
///
/// 1. **Creation**: `FileWatcher::new()` validates the root, creates
///    channels, and spawns a blocking task with the notify watcher.
/// 2. **Event Reception**: `recv()` yields events that already passed the
///    filter.
/// 3. **Shutdown**: `shutdown()` for graceful teardown, or drop the watcher;
///    dropping sends the shutdown signal without awaiting the task.
///
/// # Examples
///
/// ```no_run
/// use hb_watcher::{AcceptAllFilter, FileWatcher};
/// use hb_core::WatchConfig;
/// use camino::Utf8Path;
///
/// # async fn example() -> Result<(), hb_watcher::WatchError> {
/// let mut watcher = FileWatcher::new(
///     Utf8Path::new("./src"),
///     &WatchConfig::default(),
///     AcceptAllFilter,
/// ).await?;
///
/// while let Some(event) = watcher.recv().await {
///     println!("changed: {}", event.path);
/// }
/// # Ok(())
/// # }
/// ```
pub struct FileWatcher {
    /// Shutdown signal sender; `None` after shutdown is initiated.
    shutdown_tx: Option<oneshot::Sender<()>>,

    /// Handle to the blocking watcher task.
    task_handle: Option<JoinHandle<Result<(), WatchError>>>,

    /// Event receiver for async consumption.
    event_rx: mpsc::Receiver<FileEvent>,

    /// The root being watched.
    watch_path: Utf8PathBuf,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("watch_path", &self.watch_path)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Creates a new file watcher for the specified source root.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the root doesn't exist and
    /// [`WatchError::Notify`] if the watcher fails to initialize.
    #[allow(clippy::unused_async)] // Async for API consistency with shutdown()
    pub async fn new<F: FileFilter>(
        path: &Utf8Path,
        config: &WatchConfig,
        filter: F,
    ) -> Result<Self, WatchError> {
        if !path.exists() {
            return Err(WatchError::path_not_found(path));
        }

        let watch_path = path.canonicalize_utf8().map_err(WatchError::Io)?;

        let (event_tx, event_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task_path = watch_path.clone();
        let debounce_ms = config.debounce_ms;
        let recursive = config.recursive;

        let task_handle = tokio::task::spawn_blocking(move || {
            run_watcher_loop(
                task_path,
                debounce_ms,
                recursive,
                event_tx,
                shutdown_rx,
                filter,
            )
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
            event_rx,
            watch_path,
        })
    }

    /// Receives the next file event.
    ///
    /// Returns `None` when the watcher has been shut down or the channel is
    /// closed.
    pub async fn recv(&mut self) -> Option<FileEvent> {
        self.event_rx.recv().await
    }

    /// Returns the root being watched.
    #[must_use]
    pub fn watch_path(&self) -> &Utf8Path {
        &self.watch_path
    }

    /// Returns `true` if the watcher is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Gracefully shuts down the watcher and awaits the blocking task.
    ///
    /// # Errors
    ///
    /// Returns any error the watcher thread ended with.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => result?,
                Err(_join_error) => return Err(WatchError::ChannelClosed),
            }
        }

        Ok(())
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        // Signal the blocking task; Drop is sync so it is not awaited.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Runs the notify watcher loop in a blocking context.
#[allow(clippy::needless_pass_by_value)] // Path must be owned for the blocking task lifetime
fn run_watcher_loop<F: FileFilter>(
    path: Utf8PathBuf,
    debounce_ms: u64,
    recursive: bool,
    event_tx: mpsc::Sender<FileEvent>,
    shutdown_rx: oneshot::Receiver<()>,
    filter: F,
) -> Result<(), WatchError> {
    let timeout = Duration::from_millis(debounce_ms);

    let tx = event_tx;
    let debouncer_result: Result<Debouncer<notify::RecommendedWatcher>, notify::Error> =
        new_debouncer(timeout, move |res: DebounceEventResult| {
            match res {
                Ok(events) => {
                    for event in events {
                        let utf8_path = match Utf8PathBuf::try_from(event.path) {
                            Ok(p) => p,
                            Err(e) => {
                                let invalid_path = e.into_path_buf();
                                tracing::warn!(
                                    path = %invalid_path.display(),
                                    "skipping non-UTF-8 path in file event"
                                );
                                continue;
                            }
                        };

                        if !filter.should_process(&utf8_path) {
                            tracing::trace!(path = %utf8_path, "filtered out file event");
                            continue;
                        }

                        if tx.blocking_send(FileEvent::new(utf8_path)).is_err() {
                            tracing::debug!("event channel closed, stopping watcher");
                            break;
                        }
                    }
                }
                Err(error) => tracing::warn!(error = %error, "debouncer error"),
            }
        });

    let mut debouncer = debouncer_result?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };

    debouncer.watcher().watch(path.as_std_path(), mode)?;

    tracing::info!(path = %path, recursive, "file watcher started");

    // Hold the debouncer alive until the shutdown signal arrives.
    let _ = shutdown_rx.blocking_recv();

    tracing::info!(path = %path, "file watcher stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AcceptAllFilter;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = Utf8Path::from_path(temp_dir.path()).expect("utf8 path");

        let watcher = FileWatcher::new(path, &WatchConfig::default(), AcceptAllFilter).await;

        let watcher = watcher.expect("watcher should be created");
        assert!(watcher.is_running());
    }

    #[tokio::test]
    async fn test_watcher_path_not_found() {
        let path = Utf8Path::new("/nonexistent/path/that/does/not/exist");

        let result = FileWatcher::new(path, &WatchConfig::default(), AcceptAllFilter).await;

        match result {
            Err(WatchError::PathNotFound(_)) => {}
            other => panic!("expected PathNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_watcher_shutdown() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = Utf8Path::from_path(temp_dir.path()).expect("utf8 path");

        let watcher = FileWatcher::new(path, &WatchConfig::default(), AcceptAllFilter)
            .await
            .expect("watcher");

        watcher.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn test_watcher_receives_events() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = Utf8Path::from_path(temp_dir.path()).expect("utf8 path");

        let config = WatchConfig {
            debounce_ms: 50,
            recursive: true,
        };

        let mut watcher = FileWatcher::new(path, &config, AcceptAllFilter)
            .await
            .expect("watcher");

        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, "hello").expect("write");

        // Timing-dependent; only assert on the event when one arrives.
        let event = tokio::time::timeout(Duration::from_secs(2), watcher.recv()).await;

        watcher.shutdown().await.expect("shutdown");

        if let Ok(Some(event)) = event {
            assert!(event.path.as_str().contains("test.txt"));
        }
    }

    #[tokio::test]
    async fn test_watcher_watch_path() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = Utf8Path::from_path(temp_dir.path()).expect("utf8 path");

        let watcher = FileWatcher::new(path, &WatchConfig::default(), AcceptAllFilter)
            .await
            .expect("watcher");

        assert!(!watcher.watch_path().as_str().is_empty());
    }
}
