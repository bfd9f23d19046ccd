//! Error types for the hb-resolver crate.
//!
//! This module provides the [`ResolveError`] type for errors that can occur
//! while discovering manifests and expanding the dependency graph.
//!
//! Every resolver error indicates a configuration mistake on disk and is
//! fatal at startup: the build cannot know which vendor folders to mirror.

use camino::Utf8PathBuf;

/// Errors that can occur during production-dependency resolution.
///
/// # Examples
///
/// ```
/// use hb_resolver::ResolveError;
/// use camino::Utf8PathBuf;
///
/// let err = ResolveError::MissingDependency {
///     name: "left-pad".to_owned(),
///     from: Utf8PathBuf::from("node_modules/app"),
/// };
/// assert!(err.to_string().contains("left-pad"));
/// assert!(err.to_string().contains("node_modules/app"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A declared dependency could not be found in any enclosing vendor
    /// directory.
    ///
    /// Named dependencies are resolved nested-first with flat fallback; if
    /// no ancestor vendor directory contains the package, the build fails.
    #[error("unresolvable dependency '{name}' required by {from}")]
    MissingDependency {
        /// The dependency name that failed to resolve.
        name: String,
        /// The package folder that declared it.
        from: Utf8PathBuf,
    },

    /// A folder in the dependency working set has no package manifest.
    ///
    /// Declared dependencies must be present on disk with their manifest;
    /// a bare folder cannot contribute edges to the graph.
    #[error("no package manifest in dependency folder {0}")]
    MissingManifest(Utf8PathBuf),

    /// Failed to read a manifest file.
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// The manifest path that couldn't be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a manifest file as JSON.
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        /// The manifest path that couldn't be parsed.
        path: Utf8PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to walk a watch directory during manifest discovery.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] ignore::Error),

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// An I/O error occurred while inspecting the tree.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
