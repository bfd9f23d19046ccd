//! Error types for the hb-mirror crate.

use camino::Utf8PathBuf;

/// Errors that can occur while mirroring.
///
/// # Error Recovery Strategy
///
/// - **Transformer failures** (spawn, nonzero exit, non-UTF-8 output):
///   Fatal - a broken transformer means the output tree cannot be trusted
/// - **Glob errors**: Fatal at startup - configuration mistake
/// - **Walk errors**: Fatal during the initial scan
/// - **I/O errors**: Recoverable per event - logged, the path is skipped,
///   watching continues
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// A `--transform` glob failed to compile.
    #[error("invalid transform glob: {0}")]
    Glob(#[from] globset::Error),

    /// The transformer hook could not be spawned.
    #[error("failed to spawn transformer '{command}': {source}")]
    HookSpawn {
        /// The configured hook command.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The transformer hook exited with a nonzero status.
    #[error("transformer '{command}' failed on {input}: {status}")]
    TransformFailed {
        /// The configured hook command.
        command: String,
        /// The input file being transformed.
        input: Utf8PathBuf,
        /// The hook's exit status.
        status: std::process::ExitStatus,
    },

    /// The transformer hook produced output that is not valid UTF-8.
    ///
    /// The transformer contract requires string output.
    #[error("transformer output for {input} is not valid UTF-8")]
    TransformNotUtf8 {
        /// The input file being transformed.
        input: Utf8PathBuf,
    },

    /// Failed to walk a source root during the initial scan.
    #[error("failed to walk source tree: {0}")]
    Walk(#[from] ignore::Error),

    /// An I/O error occurred for a specific path.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path the operation failed on.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl MirrorError {
    /// Creates an [`MirrorError::Io`] for a path.
    #[inline]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error must abort the process.
    ///
    /// Transformer and configuration failures are fatal; per-path I/O
    /// errors are logged and mirroring continues.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_is_recoverable() {
        let err = MirrorError::io(
            Utf8PathBuf::from("src/a.txt"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("src/a.txt"));
    }

    #[test]
    fn test_transform_not_utf8_is_fatal() {
        let err = MirrorError::TransformNotUtf8 {
            input: Utf8PathBuf::from("src/x.js"),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("src/x.js"));
    }
}
