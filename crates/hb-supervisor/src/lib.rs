//! Child supervision for the harbor tool.
//!
//! This crate owns everything that keeps the managed child set alive across
//! source changes and crashes:
//!
//! - [`debounce`] - trailing-edge restart debouncer (300 ms window)
//! - [`execution`] - per-child registry records and kill handles
//! - [`ipc`] - the fork pause/resume control protocol over child stdio
//! - [`cleanup`] - default and user-hook cleanup behavior
//! - [`ports`] - best-effort TCP port killing for final shutdown
//! - [`supervisor`] - the actor owning the registry, crash flag, and
//!   shutdown flag
//!
//! # Architecture
//!
//! ```text
//! mirror writes ──► RestartDebouncer (300ms) ──► Restart ─┐
//! SIGINT ─────────────────────────────────────► Shutdown ─┤
//! child monitors ────────────────────────────► ChildExited├──► Supervisor
//! force-kill timers ─────────────────────────► ForceKillAll┘    (actor task)
//! ```
//!
//! All shared mutable state (registry, crash flag, shutdown flag) lives
//! inside the supervisor task; child exits and timers marshal onto it as
//! typed messages.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod cleanup;
pub mod debounce;
pub mod error;
pub mod execution;
pub mod ipc;
pub mod ports;
pub mod supervisor;

pub use cleanup::{CleanupHook, CleanupSignal};
pub use debounce::RestartDebouncer;
pub use error::SupervisorError;
pub use execution::{Execution, KillHandle};
pub use ipc::{ControlMessage, IpcSender, SIGRES};
pub use supervisor::{Supervisor, SupervisorHandle, SupervisorMessage};
