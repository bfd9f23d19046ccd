//! The supervisor actor.
//!
//! All shared mutable supervision state (the managed-child registry, the
//! crash flag, the shutdown flag) is owned by a single task driving
//! [`Supervisor::run`]. Child exits, debounced restarts, interrupts, and
//! force-kill timers are posted onto its queue as [`SupervisorMessage`]s,
//! so no state is ever touched from another task.
//!
//! The interrupt additionally raises a watch flag *before* the queue
//! message: a fork start can be parked in its pause handshake for up to
//! 30 s, and the flag lets that wait bail out so the child is still
//! cleanup-called and force-killed within the `--wait` deadline.
//!
//! # Restart semantics
//!
//! A restart with an empty registry starts the configured children: forks
//! first, serially, each honoring the pause/resume handshake; then spawns.
//! A restart with live children submits a drain-then-rebuild intent: every
//! execution is cleanup-signalled with `SIGRES` and given a per-execution
//! force-kill timer; the exit that empties the registry triggers the
//! rebuild, unless shutdown started in the meantime.
//!
//! # Shutdown semantics
//!
//! The first interrupt raises the one-shot shutdown flag and cleanup-signals
//! every execution with `SIGINT` under a single global force-kill timer.
//! When the registry drains, the final port-kill sequence runs exactly once
//! and the actor stops. Further interrupts are ignored.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use hb_core::{ChildKind, CommandLine, FxHashMap, RestartConfig};

use crate::cleanup::{CleanupHook, CleanupSignal};
use crate::error::SupervisorError;
use crate::execution::{Execution, KillHandle};
use crate::ipc::{self, ControlMessage};
use crate::ports;

/// Messages accepted by the supervisor actor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Debounced restart request from the mirror pipeline.
    Restart,
    /// The initial scan finished; restarts are now permitted, and the first
    /// one is issued immediately.
    ScanComplete,
    /// First interrupt: begin draining toward the final port kill.
    Shutdown,
    /// A managed child exited.
    ChildExited {
        /// The registry key of the child.
        command: String,
        /// Exit code; `None` when the child was terminated by a signal.
        code: Option<i32>,
    },
    /// The global shutdown force-kill timer elapsed.
    ForceKillAll,
}

/// Cloneable sender half of the supervisor's queue.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<SupervisorMessage>,
}

impl SupervisorHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<SupervisorMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Requests a restart.
    pub fn restart(&self) {
        self.send(SupervisorMessage::Restart);
    }

    /// Marks the initial scan complete, issuing the first restart.
    pub fn scan_complete(&self) {
        self.send(SupervisorMessage::ScanComplete);
    }

    /// Begins shutdown. Idempotent; repeat interrupts are ignored.
    pub fn shutdown(&self) {
        self.send(SupervisorMessage::Shutdown);
    }

    fn send(&self, message: SupervisorMessage) {
        let _ = self.tx.send(message);
    }
}

/// The supervisor actor state.
///
/// Constructed once at bootstrap; consumed by [`run`](Self::run).
pub struct Supervisor {
    forks: Vec<CommandLine>,
    spawns: Vec<CommandLine>,
    cleanup: CleanupHook,
    config: RestartConfig,
    kill_ports: Vec<u16>,

    /// The managed-child registry. Keys are exactly the configured command
    /// strings.
    registry: FxHashMap<String, Execution>,
    /// Raised on nonzero child exit; cleared when the next restart begins.
    crashed: bool,
    /// The one-shot shutdown flag.
    shutting_down: bool,
    /// Restarts are no-ops until the initial scan completes.
    ready: bool,
    /// A drain-then-rebuild intent is pending.
    draining: bool,
    /// The final port-kill sequence already ran.
    finalized: bool,

    /// Raised by the interrupt handler ahead of the queued shutdown
    /// message; observed by pause waits and child-start loops.
    interrupted: watch::Receiver<bool>,
    /// Sender for child monitors and timers to reach the actor.
    self_tx: mpsc::UnboundedSender<SupervisorMessage>,
    rx: mpsc::UnboundedReceiver<SupervisorMessage>,
}

impl Supervisor {
    /// Creates the actor and its handle.
    ///
    /// `interrupted` is the watch flag the interrupt handler raises on the
    /// first `SIGINT`; the mirror pipeline observes the same flag to stop
    /// enqueueing work.
    #[must_use]
    pub fn new(
        forks: Vec<CommandLine>,
        spawns: Vec<CommandLine>,
        cleanup: CleanupHook,
        config: RestartConfig,
        kill_ports: Vec<u16>,
        interrupted: watch::Receiver<bool>,
    ) -> (Self, SupervisorHandle) {
        let (handle, rx) = SupervisorHandle::channel();
        let supervisor = Self {
            forks,
            spawns,
            cleanup,
            config,
            kill_ports,
            registry: FxHashMap::default(),
            crashed: false,
            shutting_down: false,
            ready: false,
            draining: false,
            finalized: false,
            interrupted,
            self_tx: handle.tx.clone(),
            rx,
        };
        (supervisor, handle)
    }

    /// Drives the actor until shutdown finalizes.
    ///
    /// Returns after the final port-kill sequence has run; the caller then
    /// exits the process with code 0.
    pub async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            let done = match message {
                SupervisorMessage::Restart => {
                    self.restart().await;
                    false
                }
                SupervisorMessage::ScanComplete => {
                    self.ready = true;
                    self.restart().await;
                    false
                }
                SupervisorMessage::Shutdown => self.begin_shutdown().await,
                SupervisorMessage::ChildExited { command, code } => {
                    self.on_child_exit(command, code).await
                }
                SupervisorMessage::ForceKillAll => {
                    self.force_kill_all();
                    false
                }
            };
            if done {
                break;
            }
        }
    }

    /// The restart entry point.
    ///
    /// No-op while shutting down, before the initial scan completes, with
    /// no children configured, or while a drain is already pending.
    async fn restart(&mut self) {
        if self.shutting_down || !self.ready || self.draining {
            return;
        }
        if self.forks.is_empty() && self.spawns.is_empty() {
            return;
        }

        if self.registry.is_empty() {
            if self.crashed {
                info!("restarting from crash");
            } else {
                info!("starting children");
            }
            self.crashed = false;
            self.make_children().await;
            return;
        }

        info!("restarting");
        self.crashed = false;
        self.draining = true;

        let wait = Duration::from_millis(self.config.wait_ms);
        for execution in self.registry.values_mut() {
            self.cleanup.run(execution, CleanupSignal::Restart);

            let kill = execution.kill.clone();
            execution.kill_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                kill.fire();
            }));
        }
    }

    /// Handles the first interrupt. Returns `true` when the actor is done.
    async fn begin_shutdown(&mut self) -> bool {
        if self.shutting_down {
            debug!("interrupt ignored, already shutting down");
            return false;
        }

        info!("shutting down");
        self.shutting_down = true;

        if self.registry.is_empty() {
            return self.finalize().await;
        }

        for execution in self.registry.values() {
            self.cleanup.run(execution, CleanupSignal::Interrupt);
        }

        let wait = Duration::from_millis(self.config.wait_ms);
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = tx.send(SupervisorMessage::ForceKillAll);
        });

        false
    }

    /// Handles a child exit. Returns `true` when the actor is done.
    async fn on_child_exit(&mut self, command: String, code: Option<i32>) -> bool {
        let Some(_execution) = self.registry.remove(&command) else {
            debug!(command, "exit event for unregistered child");
            return false;
        };

        match code {
            Some(0) => info!(command, "child exited cleanly"),
            Some(code) => {
                warn!(command, code, "child crashed");
                self.crashed = true;
            }
            None => info!(command, "child terminated"),
        }

        if self.registry.is_empty() {
            if self.shutting_down {
                return self.finalize().await;
            }
            if self.draining {
                // The drain completed; rebuild the child set.
                self.draining = false;
                self.make_children().await;
            }
        }

        false
    }

    /// Hard-kills every remaining child. The exits drain the registry
    /// through the normal exit path.
    fn force_kill_all(&self) {
        for execution in self.registry.values() {
            warn!(command = %execution.command, "force killing");
            execution.kill.fire();
        }
    }

    /// Runs the final port-kill sequence exactly once.
    async fn finalize(&mut self) -> bool {
        if self.finalized {
            return true;
        }
        self.finalized = true;

        for port in &self.kill_ports {
            ports::kill_port(*port).await;
        }

        info!("stopped");
        true
    }

    /// `true` once the interrupt handler has fired, even if the queued
    /// shutdown message has not been processed yet.
    fn interrupt_pending(&self) -> bool {
        self.shutting_down || *self.interrupted.borrow()
    }

    /// Starts every configured command not already in the registry: forks
    /// first, serially and in configuration order, then spawns.
    ///
    /// An interrupt observed between child starts abandons the rest; the
    /// already-started children are drained by the shutdown path.
    async fn make_children(&mut self) {
        for command in self.forks.clone() {
            if self.interrupt_pending() {
                return;
            }
            if self.registry.contains_key(&command.raw) {
                continue;
            }
            if let Err(error) = self.start_fork(&command).await {
                warn!(command = %command, error = %error, "failed to start fork child");
            }
        }

        for command in self.spawns.clone() {
            if self.interrupt_pending() {
                return;
            }
            if self.registry.contains_key(&command.raw) {
                continue;
            }
            if let Err(error) = self.start_spawn(&command) {
                warn!(command = %command, error = %error, "failed to start spawn child");
            }
        }
    }

    /// Starts one fork child and drives its pause/resume handshake.
    ///
    /// The execution is registered before any pause waiting, so an exit
    /// during the handshake is handled by the normal exit path afterwards.
    async fn start_fork(&mut self, command: &CommandLine) -> Result<(), SupervisorError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                command: command.raw.clone(),
                source,
            })?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (ipc_tx, mut control_rx) = ipc::spawn_ipc(stdin, stdout, command.raw.clone());

        let (kill, kill_rx) = KillHandle::new();
        tokio::spawn(monitor_child(
            child,
            command.raw.clone(),
            kill_rx,
            self.self_tx.clone(),
        ));

        self.registry.insert(
            command.raw.clone(),
            Execution::new(
                command.raw.clone(),
                ChildKind::Fork,
                pid,
                Some(ipc_tx),
                kill,
            ),
        );
        info!(command = %command, pid, "fork child started");

        // Serialized cold start: a short grace window for the child to
        // request a pause, then hold further fork starts until it resumes,
        // the safety timeout fires, it exits (closing the control stream),
        // or an interrupt arrives.
        let grace = Duration::from_millis(self.config.fork_pause_grace_ms);
        match tokio::time::timeout(grace, control_rx.recv()).await {
            Err(_) | Ok(None) | Ok(Some(ControlMessage::ResumeForking)) => {}
            Ok(Some(ControlMessage::PauseForking)) => {
                info!(command = %command, "fork start paused");
                self.await_fork_release(command, &mut control_rx).await;
            }
        }

        Ok(())
    }

    /// Waits out a fork-initiated pause: resume, safety timeout, child
    /// exit, or interrupt, whichever comes first.
    async fn await_fork_release(
        &mut self,
        command: &CommandLine,
        control_rx: &mut mpsc::UnboundedReceiver<ControlMessage>,
    ) {
        let safety = Duration::from_millis(self.config.fork_pause_safety_ms);
        let mut interrupted = self.interrupted.clone();

        let released = tokio::time::timeout(safety, async {
            loop {
                tokio::select! {
                    message = control_rx.recv() => match message {
                        Some(ControlMessage::ResumeForking) | None => break,
                        Some(ControlMessage::PauseForking) => {}
                    },
                    changed = interrupted.changed() => {
                        if changed.is_err() || *interrupted.borrow() {
                            debug!(command = %command, "interrupt during fork pause");
                            break;
                        }
                    }
                }
            }
        })
        .await;

        if released.is_ok() {
            info!(command = %command, "fork start released");
        } else {
            warn!(command = %command, "fork pause safety timeout");
        }
    }

    /// Starts one spawn child with inherited stdio.
    fn start_spawn(&mut self, command: &CommandLine) -> Result<(), SupervisorError> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                command: command.raw.clone(),
                source,
            })?;

        let pid = child.id();
        let (kill, kill_rx) = KillHandle::new();
        tokio::spawn(monitor_child(
            child,
            command.raw.clone(),
            kill_rx,
            self.self_tx.clone(),
        ));

        self.registry.insert(
            command.raw.clone(),
            Execution::new(command.raw.clone(), ChildKind::Spawn, pid, None, kill),
        );
        info!(command = %command, pid, "spawn child started");

        Ok(())
    }
}

/// Owns one child process: waits for its exit, applying hard kills on
/// request, and posts the exit back to the actor.
async fn monitor_child(
    mut child: Child,
    command: String,
    mut kill_rx: mpsc::UnboundedReceiver<()>,
    events: mpsc::UnboundedSender<SupervisorMessage>,
) {
    let code = loop {
        tokio::select! {
            status = child.wait() => {
                break status.ok().and_then(|s| s.code());
            }
            Some(()) = kill_rx.recv() => {
                debug!(command, "hard killing child");
                let _ = child.start_kill();
            }
        }
    };

    let _ = events.send(SupervisorMessage::ChildExited { command, code });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    struct Harness {
        supervisor: Supervisor,
        handle: SupervisorHandle,
        interrupt_tx: watch::Sender<bool>,
    }

    fn harness(forks: Vec<&str>, spawns: Vec<&str>, wait_ms: u64) -> Harness {
        let forks = forks
            .iter()
            .map(|raw| CommandLine::parse(raw, "--fork").unwrap())
            .collect();
        let spawns = spawns
            .iter()
            .map(|raw| CommandLine::parse(raw, "--spawn").unwrap())
            .collect();
        let (interrupt_tx, interrupt_rx) = watch::channel(false);
        let config = RestartConfig {
            wait_ms,
            ..RestartConfig::default()
        };
        let (supervisor, handle) = Supervisor::new(
            forks,
            spawns,
            CleanupHook::Default,
            config,
            Vec::new(),
            interrupt_rx,
        );
        Harness {
            supervisor,
            handle,
            interrupt_tx,
        }
    }

    impl Harness {
        /// Mirrors the production interrupt path: raise the flag, then
        /// queue the shutdown message.
        fn interrupt(&self) {
            let _ = self.interrupt_tx.send(true);
            self.handle.shutdown();
        }
    }

    #[tokio::test]
    async fn test_shutdown_with_no_children_finalizes_immediately() {
        let h = harness(Vec::new(), Vec::new(), 3000);
        h.interrupt();

        tokio::time::timeout(Duration::from_secs(2), h.supervisor.run())
            .await
            .expect("supervisor should finalize");
    }

    #[tokio::test]
    async fn test_restart_is_noop_before_scan_complete() {
        let h = harness(Vec::new(), vec!["sleep 30"], 3000);

        // Restart before ScanComplete must not create children; shutdown
        // with an empty registry then finalizes immediately.
        h.handle.restart();
        h.interrupt();

        let started = Instant::now();
        tokio::time::timeout(Duration::from_secs(2), h.supervisor.run())
            .await
            .expect("supervisor should finalize without children");
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_children_then_interrupt_drains() {
        let h = harness(Vec::new(), vec!["sleep 30"], 2000);

        let Harness {
            supervisor,
            handle,
            interrupt_tx,
        } = h;
        handle.scan_complete();
        let runner = tokio::spawn(supervisor.run());

        // Give the child time to start, then interrupt. The default
        // cleanup delivers SIGINT, which terminates sleep.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = interrupt_tx.send(true);
        handle.shutdown();

        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("supervisor should drain and finalize")
            .expect("supervisor task should not panic");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_force_kill_timer_bounds_stubborn_children() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("stubborn.sh");
        fs::write(&script, "#!/bin/sh\ntrap '' INT\nsleep 30\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let h = harness(Vec::new(), vec![script.to_str().unwrap()], 300);

        let Harness {
            supervisor,
            handle,
            interrupt_tx,
        } = h;
        handle.scan_complete();
        let runner = tokio::spawn(supervisor.run());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let started = Instant::now();
        let _ = interrupt_tx.send(true);
        handle.shutdown();

        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("force-kill timer should bound the drain")
            .expect("supervisor task should not panic");
        // SIGINT is ignored by the child; only the wait-ms force kill ends it.
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fork_pause_serializes_sibling_start() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let pauser = dir.path().join("pauser.sh");
        let marker = dir.path().join("marker");
        let follower = dir.path().join("follower.sh");
        fs::write(
            &pauser,
            "#!/bin/sh\necho '{\"pauseForking\": true}'\nsleep 0.5\necho '{\"resumeForking\": true}'\nsleep 30\n",
        )
        .unwrap();
        fs::write(
            &follower,
            format!("#!/bin/sh\ntouch {}\nsleep 30\n", marker.display()),
        )
        .unwrap();
        for script in [&pauser, &follower] {
            fs::set_permissions(script, fs::Permissions::from_mode(0o755)).unwrap();
        }

        let h = harness(
            vec![pauser.to_str().unwrap(), follower.to_str().unwrap()],
            Vec::new(),
            500,
        );

        let Harness {
            supervisor,
            handle,
            interrupt_tx,
        } = h;
        handle.scan_complete();
        let runner = tokio::spawn(supervisor.run());

        // While the first fork holds the pause, the second must not start.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!marker.exists(), "second fork started during pause");

        // After the resume, it must.
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(marker.exists(), "second fork never started after resume");

        let _ = interrupt_tx.send(true);
        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("supervisor should finalize")
            .expect("supervisor task should not panic");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interrupt_during_fork_pause_is_bounded_by_wait() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("forever-paused.sh");
        // Pauses, never resumes, and ignores SIGINT.
        fs::write(
            &script,
            "#!/bin/sh\ntrap '' INT\necho '{\"pauseForking\": true}'\nsleep 30\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let h = harness(vec![script.to_str().unwrap()], Vec::new(), 500);

        let Harness {
            supervisor,
            handle,
            interrupt_tx,
        } = h;
        handle.scan_complete();
        let runner = tokio::spawn(supervisor.run());

        // Interrupt while the fork start is parked in its pause.
        tokio::time::sleep(Duration::from_millis(800)).await;
        let started = Instant::now();
        let _ = interrupt_tx.send(true);
        handle.shutdown();

        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("interrupt must not wait out the 30s pause safety")
            .expect("supervisor task should not panic");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_restart_sends_sigres_and_rebuilds() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("graceful.sh");
        let log = dir.path().join("runs.log");
        // Logs each start, then exits cleanly when the SIGRES token arrives
        // on its control channel.
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho run >> {}\nwhile read line; do\n  if [ \"$line\" = '\"SIGRES\"' ]; then exit 0; fi\ndone\nsleep 30\n",
                log.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let h = harness(vec![script.to_str().unwrap()], Vec::new(), 2000);

        let Harness {
            supervisor,
            handle,
            interrupt_tx,
        } = h;
        handle.scan_complete();
        let runner = tokio::spawn(supervisor.run());

        tokio::time::sleep(Duration::from_millis(700)).await;
        handle.restart();

        // The child exits on SIGRES and the drain rebuilds the set.
        let mut runs = 0;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            runs = fs::read_to_string(&log)
                .map(|s| s.lines().count())
                .unwrap_or(0);
            if runs >= 2 {
                break;
            }
        }
        assert_eq!(runs, 2, "expected a second start after the restart");

        let _ = interrupt_tx.send(true);
        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(6), runner)
            .await
            .expect("supervisor should finalize")
            .expect("supervisor task should not panic");
    }
}
