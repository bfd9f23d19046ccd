//! Application bootstrap and the main event loop.
//!
//! Wiring order matters and mirrors the data flow:
//!
//! 1. Wipe and recreate the output root.
//! 2. Resolve the production-dependency set (immutable afterwards).
//! 3. Build the supervisor actor, restart debouncer, and mirror pipeline.
//! 4. Run the initial scan; with no children configured this is a one-shot
//!    build and the process exits cleanly.
//! 5. Mark the scan complete (issuing the first restart), start one file
//!    watcher per source root, and drive events until shutdown finalizes.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use color_eyre::eyre::{Result, WrapErr};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use hb_core::{Options, WatchConfig};
use hb_mirror::{MirrorPipeline, PathMapper, TransformGate, Transformer};
use hb_resolver::DepResolver;
use hb_supervisor::{CleanupHook, RestartDebouncer, Supervisor, SupervisorHandle};
use hb_watcher::{FileEvent, FileWatcher, MirrorFilter};

/// Capacity of the merged watcher event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Runs the tool to completion.
///
/// Returns `Ok(())` after a clean one-shot build or a finalized shutdown;
/// any error is fatal and the caller exits nonzero (after a best-effort
/// port kill).
pub async fn run(options: Options) -> Result<()> {
    prepare_output(&options.output).await?;

    let resolver = DepResolver::new(options.watch.clone());
    let deps = Arc::new(resolver.resolve()?);
    info!(
        roots = options.watch.len(),
        output = %options.output,
        vendor_folders = deps.len(),
        forks = options.forks.len(),
        spawns = options.spawns.len(),
        "harbor starting"
    );
    let filter = Arc::new(MirrorFilter::new(deps));

    // Raised by the interrupt listener before the shutdown message, so the
    // pipeline and any parked fork start observe it immediately.
    let (interrupt_tx, interrupt_rx) = watch::channel(false);

    let (supervisor, handle) = Supervisor::new(
        options.forks.clone(),
        options.spawns.clone(),
        CleanupHook::from_command(options.cleanup.clone()),
        options.restart_config(),
        options.kill_ports.clone(),
        interrupt_rx.clone(),
    );

    let debouncer = RestartDebouncer::spawn(
        Duration::from_millis(options.restart_config().debounce_ms),
        handle.clone(),
    );

    let mapper = PathMapper::new(
        options.watch.clone(),
        options.watch_labels.clone(),
        options.output.clone(),
    );
    let gate = TransformGate::new(&options.transform)?;
    let transformer = Transformer::from_hook(options.using.clone());
    let pipeline = MirrorPipeline::new(
        mapper,
        gate,
        transformer,
        debouncer.notifier(),
        interrupt_rx.clone(),
    );

    let mut supervisor_task = tokio::spawn(supervisor.run());
    spawn_interrupt_listener(interrupt_tx, handle.clone());

    pipeline.scan(Arc::clone(&filter)).await?;

    if *interrupt_rx.borrow() {
        // Interrupted during the scan; with an empty registry the
        // supervisor finalizes the port kill immediately.
        supervisor_task.await.wrap_err("supervisor task failed")?;
        return Ok(());
    }

    if !options.has_children() {
        info!("no children configured, build complete");
        return Ok(());
    }

    handle.scan_complete();

    // One watcher per source root, all feeding a single merged channel.
    let watch_config = WatchConfig::default();
    let (event_tx, mut event_rx) = mpsc::channel::<FileEvent>(EVENT_CHANNEL_CAPACITY);
    for root in &options.watch {
        let mut watcher = FileWatcher::new(root, &watch_config, Arc::clone(&filter)).await?;
        let tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = watcher.recv().await {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(event_tx);

    let mut watchers_alive = true;
    loop {
        tokio::select! {
            result = &mut supervisor_task => {
                result.wrap_err("supervisor task failed")?;
                break;
            }
            maybe_event = event_rx.recv(), if watchers_alive => {
                match maybe_event {
                    Some(event) => {
                        // Once shutdown begins, no further work is enqueued.
                        if *interrupt_rx.borrow() {
                            continue;
                        }
                        if let Err(error) = pipeline.process(&event.path).await {
                            if error.is_fatal() {
                                return Err(error.into());
                            }
                            warn!(error = %error, "mirror error");
                        }
                    }
                    None => watchers_alive = false,
                }
            }
        }
    }

    Ok(())
}

/// Wipes and recreates the output root.
///
/// Destructive: the previous mirror is discarded every startup. The
/// directory is never recreated again during the run.
async fn prepare_output(output: &Utf8Path) -> Result<()> {
    match tokio::fs::remove_dir_all(output).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).wrap_err_with(|| format!("failed to clear output root {output}"));
        }
    }
    tokio::fs::create_dir_all(output)
        .await
        .wrap_err_with(|| format!("failed to create output root {output}"))
}

/// Listens for interrupts: the first one raises the watch flag and queues
/// the supervisor shutdown; the supervisor ignores repeats.
fn spawn_interrupt_listener(interrupt_tx: watch::Sender<bool>, handle: SupervisorHandle) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(sigint) => sigint,
                Err(error) => {
                    warn!(error = %error, "failed to install interrupt handler");
                    return;
                }
            };
            while sigint.recv().await.is_some() {
                info!("interrupt received");
                let _ = interrupt_tx.send(true);
                handle.shutdown();
            }
        }

        #[cfg(not(unix))]
        {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                info!("interrupt received");
                let _ = interrupt_tx.send(true);
                handle.shutdown();
            }
        }
    });
}
