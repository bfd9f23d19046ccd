//! Error types for the hb-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration and
//! validation errors that can occur across the workspace.

use camino::Utf8PathBuf;

/// Errors that can occur during option validation and configuration loading.
///
/// Every variant indicates a configuration mistake and is fatal at startup:
/// the process prints the diagnostic and exits nonzero.
///
/// # Examples
///
/// ```
/// use hb_core::ConfigError;
///
/// let error = ConfigError::MissingWatch;
/// assert!(error.to_string().contains("--watch"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No `--watch` directory was supplied.
    #[error("at least one --watch directory is required")]
    MissingWatch,

    /// No `--output` directory was supplied.
    #[error("an --output directory is required")]
    MissingOutput,

    /// A watch directory does not exist or is not a directory.
    #[error("watch directory not found: {0}")]
    WatchDirNotFound(Utf8PathBuf),

    /// A command string was empty after tokenization.
    #[error("empty command for {flag}")]
    EmptyCommand {
        /// The flag the empty command was supplied to.
        flag: &'static str,
    },

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// The provided path is not valid UTF-8 or is otherwise malformed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// An I/O error occurred while validating configuration.
    #[error("failed to validate configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_watch_display() {
        let error = ConfigError::MissingWatch;
        assert!(error.to_string().contains("--watch"));
    }

    #[test]
    fn test_missing_output_display() {
        let error = ConfigError::MissingOutput;
        assert!(error.to_string().contains("--output"));
    }

    #[test]
    fn test_empty_command_display() {
        let error = ConfigError::EmptyCommand { flag: "--fork" };
        assert!(error.to_string().contains("--fork"));
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::InvalidOption {
            option: "wait".to_owned(),
            reason: "must be positive".to_owned(),
        };
        let msg = error.to_string();
        assert!(msg.contains("wait"));
        assert!(msg.contains("must be positive"));
    }
}
