//! Child command tokenization.
//!
//! Managed child commands are given on the command line as single strings
//! (`--fork 'node server.js'`). This module provides [`CommandLine`], the
//! tokenized form, and [`ChildKind`], which distinguishes the two launch
//! flavors the supervisor knows about.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The launch flavor of a managed child.
///
/// Fork children are started with an attached IPC channel and participate in
/// the pause/resume startup handshake; spawn children run with inherited
/// stdio and no coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    /// Child with an IPC control channel.
    Fork,
    /// Plain child with inherited stdio.
    Spawn,
}

impl ChildKind {
    /// Returns the lowercase name used in logs and cleanup-hook arguments.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fork => "fork",
            Self::Spawn => "spawn",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tokenized child command.
///
/// The raw string is kept verbatim: it is the identity of the child in the
/// managed-child registry and is what cleanup hooks receive. Tokenization
/// splits on single spaces between the program and its arguments; there is no
/// shell quoting.
///
/// # Examples
///
/// ```
/// use hb_core::CommandLine;
///
/// let cmd = CommandLine::parse("node server.js --port 3000", "--fork").unwrap();
/// assert_eq!(cmd.program, "node");
/// assert_eq!(cmd.args, vec!["server.js", "--port", "3000"]);
/// assert_eq!(cmd.raw, "node server.js --port 3000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    /// The command string exactly as configured.
    pub raw: String,
    /// The program to execute.
    pub program: String,
    /// Arguments following the program.
    pub args: Vec<String>,
}

impl CommandLine {
    /// Tokenizes a raw command string by splitting on single spaces.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyCommand`] if the string contains no
    /// program token. The `flag` names the CLI flag for the diagnostic.
    pub fn parse(raw: &str, flag: &'static str) -> Result<Self, ConfigError> {
        let mut tokens = raw.split(' ').filter(|t| !t.is_empty());
        let program = tokens
            .next()
            .ok_or(ConfigError::EmptyCommand { flag })?
            .to_owned();
        let args = tokens.map(ToOwned::to_owned).collect();

        Ok(Self {
            raw: raw.to_owned(),
            program,
            args,
        })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
