//! Per-child registry records.
//!
//! An [`Execution`] is the supervisor's record of one managed child. The
//! child process itself is owned by its monitor task; the record carries
//! the handles the supervisor needs to reach it: the IPC sender for fork
//! children and a [`KillHandle`] for hard kills. Records are created by the
//! supervisor on spawn success and destroyed by the child's own exit event.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use hb_core::ChildKind;

use crate::ipc::IpcSender;

/// A handle that asks a child's monitor task to hard-kill it.
///
/// Firing is idempotent and never fails: if the child already exited the
/// signal goes nowhere.
#[derive(Debug, Clone)]
pub struct KillHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl KillHandle {
    /// Creates a handle and the receiver its monitor task listens on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Requests a hard kill.
    pub fn fire(&self) {
        let _ = self.tx.send(());
    }
}

/// The supervisor's record of one managed child.
#[derive(Debug)]
pub struct Execution {
    /// The configured command string; the registry key.
    pub command: String,

    /// Fork or spawn.
    pub kind: ChildKind,

    /// OS process id, when the child reported one.
    pub pid: Option<u32>,

    /// Control-channel sender; fork children only.
    pub ipc: Option<IpcSender>,

    /// Hard-kill handle toward the monitor task.
    pub kill: KillHandle,

    /// Pending force-kill timer armed during restart, if any.
    pub kill_timer: Option<JoinHandle<()>>,
}

impl Execution {
    /// Creates a record for a freshly spawned child.
    #[must_use]
    pub fn new(
        command: String,
        kind: ChildKind,
        pid: Option<u32>,
        ipc: Option<IpcSender>,
        kill: KillHandle,
    ) -> Self {
        Self {
            command,
            kind,
            pid,
            ipc,
            kill,
            kill_timer: None,
        }
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        // A registry removal cancels the pending force-kill timer; firing a
        // kill at an already-gone child would be harmless but noisy.
        if let Some(timer) = self.kill_timer.take() {
            timer.abort();
        }
    }
}
