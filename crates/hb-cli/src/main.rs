//! CLI entry point for the harbor tool.
//!
//! Mirrors watched source trees into an output directory, optionally
//! transforming matching files through a user hook, and keeps configured
//! child commands alive across source changes and crashes.
//!
//! # Usage
//!
//! ```bash
//! harbor -w src -o out
//! harbor -w src -o out -t 'src/**/*.js' -u ./upcase.sh
//! harbor -w src -o out --fork 'node svr.js' --kill 3000 --wait 200
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod app;
mod args;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_tracing(args.debug);

    let options = args.into_options()?;

    match app::run(options.clone()).await {
        Ok(()) => Ok(()),
        Err(error) => {
            // A fatal error still runs the final port kill, best effort,
            // before the nonzero exit.
            for port in &options.kill_ports {
                hb_supervisor::ports::kill_port(*port).await;
            }
            Err(error)
        }
    }
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `--debug` selects debug-level
/// output (including per-path vendor filter decisions), defaulting to info.
fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
