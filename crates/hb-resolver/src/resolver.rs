//! Dependency fixpoint expansion.
//!
//! This module provides [`DepResolver`], which computes the immutable
//! production-dependency set [`ProdDeps`] from the watch roots:
//!
//! 1. Discover top-level manifests (no vendor segment in their path).
//! 2. Seed every direct dependency of every top-level package, plus every
//!    symlinked vendor entry.
//! 3. Expand to a fixpoint: each new folder's own dependencies are resolved
//!    nested-first with flat fallback and added if new. Cycles terminate
//!    because membership is deduplicated and only new paths advance.
//! 4. Expand `@scope` organization folders so the per-event filter needs a
//!    single lookup to admit scoped package children.
//!
//! An unresolvable dependency is a fatal diagnostic naming both the missing
//! package and the folder that requires it.

use std::collections::VecDeque;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use hb_core::paths::normalize;
use hb_core::FxHashSet;

use crate::discovery::discover_manifest_dirs;
use crate::error::ResolveError;
use crate::manifest::PackageManifest;
use crate::VENDOR_DIR;

/// The immutable set of vendor folders that participate in the build.
///
/// Membership is checked with absolutized, lexically normalized folder
/// paths. Computed once at startup; never mutated after the mirror pipeline
/// begins.
#[derive(Debug, Clone, Default)]
pub struct ProdDeps {
    folders: FxHashSet<Utf8PathBuf>,
}

impl ProdDeps {
    /// Builds a set from pre-normalized folder paths.
    ///
    /// Primarily useful in tests; production code goes through
    /// [`DepResolver::resolve`].
    #[must_use]
    pub fn from_folders(folders: impl IntoIterator<Item = Utf8PathBuf>) -> Self {
        Self {
            folders: folders.into_iter().collect(),
        }
    }

    /// Returns `true` if `folder` is a member of the set.
    #[must_use]
    pub fn contains(&self, folder: &Utf8Path) -> bool {
        self.folders.contains(folder)
    }

    /// Number of folders in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    /// Returns `true` if no vendor folder participates in the build.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Iterates the member folders in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.folders.iter()
    }
}

/// Resolver for the production-dependency set.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8PathBuf;
/// use hb_resolver::DepResolver;
///
/// # fn main() -> Result<(), hb_resolver::ResolveError> {
/// let resolver = DepResolver::new(vec![Utf8PathBuf::from("/repo/src")]);
/// let deps = resolver.resolve()?;
/// println!("{} vendor folders participate", deps.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DepResolver {
    roots: Vec<Utf8PathBuf>,
}

impl DepResolver {
    /// Creates a resolver over the given watch roots.
    #[must_use]
    pub fn new(roots: Vec<Utf8PathBuf>) -> Self {
        Self { roots }
    }

    /// Computes the production-dependency set.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] when discovery fails, a manifest cannot be
    /// read or parsed, a working-set folder has no manifest, or a declared
    /// dependency cannot be resolved in any enclosing vendor directory.
    pub fn resolve(&self) -> Result<ProdDeps, ResolveError> {
        let manifest_dirs = discover_manifest_dirs(&self.roots)?;

        let mut set = FxHashSet::default();
        let mut pending = VecDeque::new();

        for dir in &manifest_dirs {
            let manifest = PackageManifest::load(&PackageManifest::path_in(dir))?;
            let vendor = dir.join(VENDOR_DIR);

            for name in manifest.dependency_names() {
                enqueue(normalize(&vendor.join(name)), &mut set, &mut pending);
            }
            seed_symlinks(&vendor, &mut set, &mut pending)?;
        }

        while let Some(dep) = pending.pop_front() {
            let manifest_path = PackageManifest::path_in(&dep);
            if !manifest_path.is_file() {
                return Err(ResolveError::MissingManifest(dep));
            }
            let manifest = PackageManifest::load(&manifest_path)?;

            for name in manifest.dependency_names() {
                let resolved = resolve_nested_first(&dep, name)?;
                enqueue(resolved, &mut set, &mut pending);
            }
            seed_symlinks(&dep.join(VENDOR_DIR), &mut set, &mut pending)?;
        }

        // Org expansion: admitting the @scope folder makes the per-event
        // filter a single lookup for scoped package children.
        let orgs: Vec<Utf8PathBuf> = set
            .iter()
            .filter_map(|folder| {
                let parent = folder.parent()?;
                parent
                    .file_name()
                    .is_some_and(|name| name.starts_with('@'))
                    .then(|| parent.to_owned())
            })
            .collect();
        for org in orgs {
            debug!(folder = %org, "org expansion");
            set.insert(org);
        }

        info!(folders = set.len(), "production dependency set resolved");
        Ok(ProdDeps { folders: set })
    }
}

/// Adds `folder` to the set, scheduling its expansion if it is new.
fn enqueue(folder: Utf8PathBuf, set: &mut FxHashSet<Utf8PathBuf>, pending: &mut VecDeque<Utf8PathBuf>) {
    if set.insert(folder.clone()) {
        debug!(folder = %folder, "dependency folder added");
        pending.push_back(folder);
    }
}

/// Seeds every non-hidden symlinked entry of a vendor directory.
///
/// Symlinked vendor folders (workspace links, `npm link` style installs)
/// participate unconditionally; the link itself is never followed here, only
/// classified.
fn seed_symlinks(
    vendor: &Utf8Path,
    set: &mut FxHashSet<Utf8PathBuf>,
    pending: &mut VecDeque<Utf8PathBuf>,
) -> Result<(), ResolveError> {
    if !vendor.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(vendor)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            debug!(path = %entry.path().display(), "skipping non-UTF-8 vendor entry");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if entry.path().symlink_metadata()?.file_type().is_symlink() {
            enqueue(normalize(&vendor.join(name)), set, pending);
        }
    }

    Ok(())
}

/// Resolves a named dependency from a package folder, nested-first with
/// flat fallback.
///
/// Starting at `from` and ascending its ancestors, the first
/// `<ancestor>/node_modules/<name>` that carries a manifest wins.
fn resolve_nested_first(from: &Utf8Path, name: &str) -> Result<Utf8PathBuf, ResolveError> {
    for ancestor in from.ancestors() {
        let candidate = ancestor.join(VENDOR_DIR).join(name);
        if PackageManifest::path_in(&candidate).is_file() {
            return Ok(normalize(&candidate));
        }
    }

    Err(ResolveError::MissingDependency {
        name: name.to_owned(),
        from: from.to_owned(),
    })
}
