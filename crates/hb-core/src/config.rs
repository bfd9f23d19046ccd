//! Configuration structures for the harbor tool.
//!
//! This module provides configuration types for all components of the
//! application:
//!
//! - [`Options`] - Validated CLI options (watch roots, output, children, hooks)
//! - [`WatchConfig`] - File watcher settings (filesystem debounce, recursion)
//! - [`RestartConfig`] - Supervisor timing (restart debounce, force-kill wait,
//!   fork pause protocol windows)
//!
//! All tuning types implement [`Default`] with the values the tool ships with.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::command::CommandLine;
use crate::error::ConfigError;
use crate::paths::absolutize;

/// Configuration for the file watcher.
///
/// Controls how filesystem changes are detected and debounced before they
/// reach the mirror pipeline. This window is distinct from the restart
/// debounce in [`RestartConfig`].
///
/// # Examples
///
/// ```
/// use hb_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert_eq!(config.debounce_ms, 100);
/// assert!(config.recursive);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Filesystem debounce window in milliseconds.
    ///
    /// Multiple raw change notifications for a path within this window are
    /// collapsed into a single event.
    pub debounce_ms: u64,

    /// Whether to watch subdirectories recursively.
    pub recursive: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            recursive: true,
        }
    }
}

/// Timing configuration for the child supervisor.
///
/// # Examples
///
/// ```
/// use hb_core::RestartConfig;
///
/// let config = RestartConfig::default();
/// assert_eq!(config.debounce_ms, 300);
/// assert_eq!(config.wait_ms, 3000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Trailing-edge restart debounce window in milliseconds.
    ///
    /// Any number of mirror writes within this window produce exactly one
    /// restart.
    pub debounce_ms: u64,

    /// Force-kill deadline in milliseconds (`--wait`).
    ///
    /// Applied per execution during restart and once globally during
    /// shutdown.
    pub wait_ms: u64,

    /// Grace period after a fork child starts for a pause message to arrive,
    /// in milliseconds.
    pub fork_pause_grace_ms: u64,

    /// Safety timeout for a fork-initiated pause, in milliseconds.
    ///
    /// A paused fork start is forcibly released after this long even if the
    /// child never sends a resume message.
    pub fork_pause_safety_ms: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            wait_ms: 3000,
            fork_pause_grace_ms: 500,
            fork_pause_safety_ms: 30_000,
        }
    }
}

/// Validated application options.
///
/// Built from raw CLI arguments by the binary; validation absolutizes the
/// watch and output paths and tokenizes child commands, so the rest of the
/// workspace never re-checks them.
///
/// The original user-supplied watch paths are kept in `watch_labels`: the
/// transform gate matches globs against `label/rest...` paths, exactly as
/// the user spelled the roots on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Absolutized source roots to watch.
    pub watch: Vec<Utf8PathBuf>,

    /// Watch roots exactly as supplied on the command line, trailing slashes
    /// stripped. Parallel to `watch`.
    pub watch_labels: Vec<Utf8PathBuf>,

    /// Absolutized output root. Wiped and recreated at startup.
    pub output: Utf8PathBuf,

    /// Glob patterns selecting files that pass through the transformer.
    pub transform: Vec<String>,

    /// Transformer hook command, if configured.
    pub using: Option<CommandLine>,

    /// Fork-style child commands, in configuration order.
    pub forks: Vec<CommandLine>,

    /// Spawn-style child commands, in configuration order.
    pub spawns: Vec<CommandLine>,

    /// Cleanup hook command, if configured.
    pub cleanup: Option<CommandLine>,

    /// TCP ports to kill during the final shutdown sequence, in order.
    pub kill_ports: Vec<u16>,

    /// Force-kill deadline in milliseconds.
    pub wait_ms: u64,

    /// Verbose vendor-path logging.
    pub debug: bool,
}

impl Options {
    /// Builds validated options from raw CLI values.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when no watch root or output is given, a
    /// watch root does not exist, or a command string is empty.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        watch: Vec<Utf8PathBuf>,
        output: Option<Utf8PathBuf>,
        transform: Vec<String>,
        using: Option<String>,
        forks: Vec<String>,
        spawns: Vec<String>,
        cleanup: Option<String>,
        kill_ports: Vec<u16>,
        wait_ms: u64,
        debug: bool,
    ) -> Result<Self, ConfigError> {
        if watch.is_empty() {
            return Err(ConfigError::MissingWatch);
        }
        let output = output.ok_or(ConfigError::MissingOutput)?;

        let mut roots = Vec::with_capacity(watch.len());
        let mut labels = Vec::with_capacity(watch.len());
        for raw in watch {
            let root = absolutize(&raw)?;
            if !root.is_dir() {
                return Err(ConfigError::WatchDirNotFound(raw));
            }
            labels.push(crate::paths::normalize(&raw));
            roots.push(root);
        }

        let using = using
            .map(|raw| CommandLine::parse(&raw, "--using"))
            .transpose()?;
        let cleanup = cleanup
            .map(|raw| CommandLine::parse(&raw, "--cleanup"))
            .transpose()?;
        let forks = forks
            .iter()
            .map(|raw| CommandLine::parse(raw, "--fork"))
            .collect::<Result<Vec<_>, _>>()?;
        let spawns = spawns
            .iter()
            .map(|raw| CommandLine::parse(raw, "--spawn"))
            .collect::<Result<Vec<_>, _>>()?;

        if using.is_some() && transform.is_empty() {
            return Err(ConfigError::InvalidOption {
                option: "--using".to_owned(),
                reason: "a transformer requires at least one --transform glob".to_owned(),
            });
        }

        Ok(Self {
            watch: roots,
            watch_labels: labels,
            output: absolutize(&output)?,
            transform,
            using,
            forks,
            spawns,
            cleanup,
            kill_ports,
            wait_ms,
            debug,
        })
    }

    /// Returns `true` if no fork or spawn commands are configured.
    ///
    /// With no children the tool performs a one-shot build: mirror the tree,
    /// log, and exit.
    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.forks.is_empty() || !self.spawns.is_empty()
    }

    /// Restart timing derived from these options.
    #[must_use]
    pub fn restart_config(&self) -> RestartConfig {
        RestartConfig {
            wait_ms: self.wait_ms,
            ..RestartConfig::default()
        }
    }
}
