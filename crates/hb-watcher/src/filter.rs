//! Path filtering for scans and watch events.
//!
//! The [`FileFilter`] trait is the accept/reject decision applied to every
//! candidate path, both during the initial tree scan and per watch event.
//! Filtering runs in the blocking watcher thread, before events are sent to
//! the channel, so rejected paths never reach async processing.
//!
//! The production implementation is [`MirrorFilter`], which consults the
//! production-dependency set for anything under a vendor segment:
//!
//! - Temporary files (trailing `~`) are rejected everywhere.
//! - `.bin` entries are rejected everywhere.
//! - Outside vendor trees, everything else is accepted.
//! - Inside vendor trees, the longest `…/node_modules[/@scope][/name]`
//!   prefix must be a member of the dependency set. The terminal
//!   `node_modules` directory itself is always accepted so children can be
//!   examined.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use hb_resolver::{ProdDeps, VENDOR_DIR};

/// A filter for determining which paths participate in the mirror.
///
/// # Thread Safety
///
/// Filters must be [`Send`] and [`Sync`] because they are used from the
/// blocking watcher thread, and `'static` to be moved into the spawned
/// task.
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if the path should be processed.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// A filter that accepts all paths.
///
/// Useful in tests and for watch setups with no vendor trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl FileFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _path: &Utf8Path) -> bool {
        true
    }
}

/// The production filter: vendor paths are admitted only when their package
/// folder participates in the build.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use camino::{Utf8Path, Utf8PathBuf};
/// use hb_resolver::ProdDeps;
/// use hb_watcher::{FileFilter, MirrorFilter};
///
/// let deps = ProdDeps::from_folders([Utf8PathBuf::from("/repo/node_modules/x")]);
/// let filter = MirrorFilter::new(Arc::new(deps));
///
/// assert!(filter.should_process(Utf8Path::new("/repo/src/app.js")));
/// assert!(filter.should_process(Utf8Path::new("/repo/node_modules/x/index.js")));
/// assert!(!filter.should_process(Utf8Path::new("/repo/node_modules/z/index.js")));
/// ```
#[derive(Debug, Clone)]
pub struct MirrorFilter {
    deps: Arc<ProdDeps>,
}

impl MirrorFilter {
    /// Creates a filter over the resolved production-dependency set.
    #[must_use]
    pub fn new(deps: Arc<ProdDeps>) -> Self {
        Self { deps }
    }

    /// Computes the package prefix of a vendor path: the longest prefix of
    /// the form `…/node_modules[/@scope][/name]`.
    ///
    /// Returns `None` for paths with no vendor segment, and the terminal
    /// vendor directory itself when the path ends there.
    fn package_prefix(path: &Utf8Path) -> Option<(Utf8PathBuf, bool)> {
        let comps: Vec<&str> = path.components().map(|c| c.as_str()).collect();
        let last_vendor = comps.iter().rposition(|c| *c == VENDOR_DIR)?;

        let rest = &comps[last_vendor + 1..];
        if rest.is_empty() {
            let prefix = comps.iter().copied().collect();
            return Some((prefix, true));
        }

        let prefix_len = if rest[0].starts_with('@') && rest.len() >= 2 {
            last_vendor + 3
        } else {
            last_vendor + 2
        };
        let prefix = comps[..prefix_len].iter().copied().collect();
        Some((prefix, false))
    }
}

impl FileFilter for MirrorFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        // Editor temp files never participate.
        if path.as_str().ends_with('~') {
            return false;
        }

        // .bin shims are rejected inside and outside vendor trees.
        if path.components().any(|c| c.as_str() == ".bin") {
            return false;
        }

        match Self::package_prefix(path) {
            // Non-vendor paths are always mirrored.
            None => true,
            // The terminal vendor directory is accepted so traversal can
            // examine its children.
            Some((_, true)) => true,
            Some((prefix, false)) => {
                let accepted = self.deps.contains(&prefix);
                debug!(path = %path, prefix = %prefix, accepted, "vendor filter decision");
                accepted
            }
        }
    }
}

// Shared filters are handed to multiple watchers.
impl<F: FileFilter + ?Sized> FileFilter for Arc<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}

impl<F: FileFilter + ?Sized> FileFilter for Box<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}
