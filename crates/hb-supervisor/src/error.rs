//! Error types for the hb-supervisor crate.
//!
//! Most supervisor failures are tolerated and logged (a misbehaving child
//! must never take the loop down); the error type exists for the few
//! operations whose failure the caller decides about.

/// Errors that can occur while managing children.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// A child command failed to start.
    ///
    /// Logged by the supervisor; the command is retried on the next
    /// debounced restart.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// The configured command string.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
