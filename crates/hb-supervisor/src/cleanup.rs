//! Child cleanup behavior.
//!
//! During restart and shutdown the supervisor gives every execution a
//! chance to exit on its own terms before the force-kill timer fires. The
//! behavior is either the built-in default or a user hook command
//! (`--cleanup CMD`), run as `CMD <command> <kind> <signal>` with
//! `kind ∈ {fork, spawn}` and `signal ∈ {SIGINT, SIGRES}`.
//!
//! Cleanup failures are logged and never abort shutdown or restart; the
//! force-kill timer remains the safety net.

use std::fmt;

use tokio::process::Command;
use tracing::{debug, warn};

use hb_core::{ChildKind, CommandLine};

use crate::execution::Execution;

/// The reason cleanup is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupSignal {
    /// Process interrupt: the whole tool is shutting down.
    Interrupt,
    /// Restart: the child should exit so a fresh one can take its place.
    Restart,
}

impl CleanupSignal {
    /// The token handed to cleanup hooks.
    ///
    /// `SIGRES` is a protocol token, not an OS signal.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Restart => "SIGRES",
        }
    }
}

impl fmt::Display for CleanupSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleanup behavior for managed children.
#[derive(Debug, Clone)]
pub enum CleanupHook {
    /// Built-in behavior: deliver SIGINT on interrupt; on restart, send the
    /// `SIGRES` token to fork children and hard-kill spawn children.
    Default,
    /// User hook command.
    Command(CommandLine),
}

impl CleanupHook {
    /// Builds the hook from the optional `--cleanup` command.
    #[must_use]
    pub fn from_command(command: Option<CommandLine>) -> Self {
        command.map_or(Self::Default, Self::Command)
    }

    /// Invokes cleanup for one execution.
    ///
    /// User hooks are launched detached: a hanging hook must not stall the
    /// supervisor, and the force-kill timer bounds the child's lifetime
    /// either way.
    pub fn run(&self, execution: &Execution, signal: CleanupSignal) {
        match self {
            Self::Default => default_cleanup(execution, signal),
            Self::Command(hook) => run_hook(hook, execution, signal),
        }
    }
}

/// The built-in cleanup behavior.
fn default_cleanup(execution: &Execution, signal: CleanupSignal) {
    match signal {
        CleanupSignal::Interrupt => interrupt_child(execution),
        CleanupSignal::Restart => match execution.kind {
            ChildKind::Fork => {
                if let Some(ipc) = &execution.ipc {
                    debug!(command = %execution.command, "sending SIGRES");
                    ipc.send_sigres();
                } else {
                    execution.kill.fire();
                }
            }
            ChildKind::Spawn => execution.kill.fire(),
        },
    }
}

/// Delivers a POSIX interrupt; the child is expected to exit itself.
#[cfg(unix)]
fn interrupt_child(execution: &Execution) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = execution.pid else {
        execution.kill.fire();
        return;
    };

    #[allow(clippy::cast_possible_wrap)]
    let pid = Pid::from_raw(pid as i32);
    if let Err(error) = kill(pid, Signal::SIGINT) {
        warn!(command = %execution.command, error = %error, "failed to deliver SIGINT");
        execution.kill.fire();
    }
}

#[cfg(not(unix))]
fn interrupt_child(execution: &Execution) {
    // No interrupt delivery off unix; fall back to a hard kill.
    execution.kill.fire();
}

/// Launches the user cleanup hook, detached.
fn run_hook(hook: &CommandLine, execution: &Execution, signal: CleanupSignal) {
    let result = Command::new(&hook.program)
        .args(&hook.args)
        .arg(&execution.command)
        .arg(execution.kind.as_str())
        .arg(signal.as_str())
        .spawn();

    match result {
        Ok(mut child) => {
            let command = hook.raw.clone();
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) if status.success() => {}
                    Ok(status) => warn!(command = %command, %status, "cleanup hook failed"),
                    Err(error) => warn!(command = %command, error = %error, "cleanup hook error"),
                }
            });
        }
        Err(error) => {
            warn!(command = %hook.raw, error = %error, "failed to spawn cleanup hook");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::KillHandle;

    fn execution(kind: ChildKind) -> (Execution, tokio::sync::mpsc::UnboundedReceiver<()>) {
        let (kill, rx) = KillHandle::new();
        (
            Execution::new("cmd arg".to_owned(), kind, None, None, kill),
            rx,
        )
    }

    #[test]
    fn test_signal_tokens() {
        assert_eq!(CleanupSignal::Interrupt.as_str(), "SIGINT");
        assert_eq!(CleanupSignal::Restart.as_str(), "SIGRES");
    }

    #[tokio::test]
    async fn test_default_restart_hard_kills_spawn() {
        let (execution, mut rx) = execution(ChildKind::Spawn);
        CleanupHook::Default.run(&execution, CleanupSignal::Restart);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_default_restart_fork_without_ipc_falls_back_to_kill() {
        let (execution, mut rx) = execution(ChildKind::Fork);
        CleanupHook::Default.run(&execution, CleanupSignal::Restart);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_default_interrupt_without_pid_falls_back_to_kill() {
        let (execution, mut rx) = execution(ChildKind::Spawn);
        CleanupHook::Default.run(&execution, CleanupSignal::Interrupt);
        assert!(rx.recv().await.is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hook_receives_command_kind_signal() {
        use std::fs;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("hook.sh");
        let out = dir.path().join("out.txt");
        fs::write(
            &script,
            format!("#!/bin/sh\necho \"$1|$2|$3\" > {}\n", out.display()),
        )
        .unwrap();
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let hook = CleanupHook::Command(
            CommandLine::parse(script.to_str().unwrap(), "--cleanup").unwrap(),
        );
        let (execution, _rx) = execution(ChildKind::Fork);
        hook.run(&execution, CleanupSignal::Restart);

        // The hook runs detached; give it a moment.
        for _ in 0..50 {
            if out.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let recorded = fs::read_to_string(&out).unwrap();
        assert_eq!(recorded.trim(), "cmd arg|fork|SIGRES");
    }
}
