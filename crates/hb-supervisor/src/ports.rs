//! Best-effort TCP port killing for final shutdown.
//!
//! The actual killing is delegated to an external tool; failures are logged
//! and never block the shutdown sequence.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

/// Kills whatever holds the given TCP port, best effort.
pub async fn kill_port(port: u16) {
    #[cfg(unix)]
    {
        let result = Command::new("fuser")
            .arg("-k")
            .arg(format!("{port}/tcp"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match result {
            Ok(status) if status.success() => info!(port, "killed port"),
            Ok(_) => debug!(port, "no process on port"),
            Err(error) => warn!(port, error = %error, "port killer unavailable"),
        }
    }

    #[cfg(not(unix))]
    {
        warn!(port, "port killing is not supported on this platform");
    }
}
