//! The fork control protocol.
//!
//! Fork children get a line-delimited control channel over their piped
//! stdin/stdout. Three messages matter:
//!
//! - child → parent `{"pauseForking": true}`: hold further fork starts
//! - child → parent `{"resumeForking": true}`: release the hold
//! - parent → child `"SIGRES"` (a JSON string line): please exit gracefully
//!
//! `SIGRES` is a protocol token, not an OS signal; it is never delivered via
//! the signal subsystem. Child stdout lines that are not control messages
//! are passed through to the parent's stdout verbatim. stderr is inherited.

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// The graceful-exit protocol token sent to fork children during restart.
pub const SIGRES: &str = "SIGRES";

/// A control message received from a fork child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Hold further fork starts until resumed.
    PauseForking,
    /// Release the fork-start hold.
    ResumeForking,
}

/// The wire shape of child → parent control lines.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ControlFrame {
    pause_forking: bool,
    resume_forking: bool,
}

/// Parses a child stdout line as a control message.
///
/// Returns `None` for ordinary output lines, which the reader forwards.
#[must_use]
pub fn parse_control(line: &str) -> Option<ControlMessage> {
    let frame: ControlFrame = serde_json::from_str(line).ok()?;
    if frame.pause_forking {
        Some(ControlMessage::PauseForking)
    } else if frame.resume_forking {
        Some(ControlMessage::ResumeForking)
    } else {
        None
    }
}

/// The JSON line carrying the graceful-exit token.
#[must_use]
pub fn sigres_line() -> String {
    format!("\"{SIGRES}\"")
}

/// Sender half of a fork child's control channel.
///
/// Lines are written to the child's stdin by a dedicated writer task, so
/// senders never block on a slow child.
#[derive(Debug, Clone)]
pub struct IpcSender {
    tx: mpsc::UnboundedSender<String>,
}

impl IpcSender {
    /// Sends one line to the child.
    pub fn send_line(&self, line: String) {
        let _ = self.tx.send(line);
    }

    /// Sends the graceful-exit token.
    pub fn send_sigres(&self) {
        self.send_line(sigres_line());
    }
}

/// Spawns the reader and writer tasks for a fork child's stdio.
///
/// Returns the sender for parent → child lines and the receiver of control
/// messages. The control receiver ends (yields `None`) when the child's
/// stdout closes, which releases any pending pause wait.
pub fn spawn_ipc(
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    command: String,
) -> (IpcSender, mpsc::UnboundedReceiver<ControlMessage>) {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    if let Some(mut stdin) = stdin {
        tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                if stdin.write_all(line.as_bytes()).await.is_err()
                    || stdin.write_all(b"\n").await.is_err()
                    || stdin.flush().await.is_err()
                {
                    debug!("child stdin closed");
                    break;
                }
            }
        });
    }

    if let Some(stdout) = stdout {
        let reader_command = command;
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(message) = parse_control(&line) {
                            debug!(command = %reader_command, ?message, "control message");
                            if control_tx.send(message).is_err() {
                                break;
                            }
                        } else {
                            // Ordinary child output passes through.
                            println!("{line}");
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        warn!(command = %reader_command, error = %error, "error reading child output");
                        break;
                    }
                }
            }
            // Dropping control_tx here ends the control stream, releasing
            // any pause wait on child exit.
        });
    }

    (IpcSender { tx: line_tx }, control_rx)
}
