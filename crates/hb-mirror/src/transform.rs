//! Transform gating and the transformer hook.
//!
//! A file passes through the transformer iff at least one configured glob
//! matches its label-prefixed relative path. With no globs configured,
//! nothing is transformed.
//!
//! The transformer itself is a sidecar command hook: for each gated file it
//! runs as `CMD <abs-input> <abs-output>` with the file contents on stdin,
//! and its stdout is the transformed contents. A nonzero exit status or
//! non-UTF-8 output is fatal. When no hook is configured, the identity
//! transformer is used.

use std::process::Stdio;

use camino::Utf8Path;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use hb_core::CommandLine;

use crate::error::MirrorError;

/// Decides per file whether the transformer applies.
///
/// # Examples
///
/// ```
/// use hb_mirror::TransformGate;
///
/// let gate = TransformGate::new(&["src/**/*.js".to_owned()]).unwrap();
/// assert!(gate.matches("src/x.js"));
/// assert!(gate.matches("src/deep/nested/y.js"));
/// assert!(!gate.matches("src/style.css"));
///
/// let empty = TransformGate::new(&[]).unwrap();
/// assert!(!empty.matches("src/x.js"));
/// ```
#[derive(Debug, Clone)]
pub struct TransformGate {
    set: GlobSet,
    configured: bool,
}

impl TransformGate {
    /// Compiles the configured glob patterns.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Glob`] for a malformed pattern.
    pub fn new(patterns: &[String]) -> Result<Self, MirrorError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            set: builder.build()?,
            configured: !patterns.is_empty(),
        })
    }

    /// Returns `true` if the label-prefixed relative path is gated.
    #[must_use]
    pub fn matches(&self, gate_path: &str) -> bool {
        self.configured && self.set.is_match(gate_path)
    }
}

/// The per-file content transformer.
#[derive(Debug, Clone)]
pub enum Transformer {
    /// Pass contents through unchanged (no `--using` configured).
    Identity,
    /// Run the configured sidecar command per file.
    Hook(CommandLine),
}

impl Transformer {
    /// Builds the transformer from the optional `--using` hook.
    #[must_use]
    pub fn from_hook(hook: Option<CommandLine>) -> Self {
        hook.map_or(Self::Identity, Self::Hook)
    }

    /// Applies the transformer to one file's contents.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`MirrorError`] if the hook cannot be spawned, exits
    /// nonzero, or produces non-UTF-8 output.
    pub async fn apply(
        &self,
        input: &Utf8Path,
        output: &Utf8Path,
        contents: &str,
    ) -> Result<String, MirrorError> {
        let command = match self {
            Self::Identity => return Ok(contents.to_owned()),
            Self::Hook(command) => command,
        };

        debug!(input = %input, command = %command, "transforming");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .arg(input.as_str())
            .arg(output.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| MirrorError::HookSpawn {
                command: command.raw.clone(),
                source,
            })?;

        // Feed stdin from a task so a hook that streams output before
        // draining its input cannot deadlock against us.
        let stdin = child.stdin.take();
        let payload = contents.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(&payload).await;
                let _ = stdin.shutdown().await;
            }
        });

        let result = child
            .wait_with_output()
            .await
            .map_err(|source| MirrorError::HookSpawn {
                command: command.raw.clone(),
                source,
            })?;
        let _ = writer.await;

        if !result.status.success() {
            return Err(MirrorError::TransformFailed {
                command: command.raw.clone(),
                input: input.to_owned(),
                status: result.status,
            });
        }

        String::from_utf8(result.stdout).map_err(|_| MirrorError::TransformNotUtf8 {
            input: input.to_owned(),
        })
    }
}
