//! Top-level manifest discovery.
//!
//! Recursively scans each watch root for folders carrying a package
//! manifest, ignoring dotfiles and anything inside a vendor segment. The
//! resulting folders are the seeds of the dependency fixpoint.
//!
//! Uses the `ignore` crate's walker in the same collect-first style as the
//! rest of the workspace; gitignore handling is disabled because manifest
//! discovery must see the tree exactly as it is on disk.

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use tracing::debug;

use crate::error::ResolveError;
use crate::manifest::MANIFEST_FILE;
use crate::VENDOR_DIR;

/// Discovers the folders under `roots` that contain a top-level package
/// manifest.
///
/// A manifest is top-level when no component of its path is a vendor
/// segment. Hidden files and directories are skipped entirely.
///
/// # Errors
///
/// Returns [`ResolveError::Walk`] if traversal fails or
/// [`ResolveError::NonUtf8Path`] for paths that cannot be represented as
/// UTF-8.
pub fn discover_manifest_dirs(roots: &[Utf8PathBuf]) -> Result<Vec<Utf8PathBuf>, ResolveError> {
    let mut dirs = Vec::new();

    for root in roots {
        let walker = WalkBuilder::new(root)
            // No gitignore semantics; the tree on disk is the truth.
            .standard_filters(false)
            // Dotfiles never contain top-level manifests.
            .hidden(true)
            .follow_links(false)
            .threads(1)
            .filter_entry(|entry| entry.file_name() != VENDOR_DIR)
            .build();

        for result in walker {
            let entry = result?;
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            let utf8_path = Utf8Path::from_path(path)
                .ok_or_else(|| ResolveError::NonUtf8Path(path.to_owned()))?;

            if utf8_path.file_name() == Some(MANIFEST_FILE) {
                if let Some(dir) = utf8_path.parent() {
                    debug!(manifest = %utf8_path, "discovered top-level manifest");
                    dirs.push(dir.to_owned());
                }
            }
        }
    }

    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap()
    }

    #[test]
    fn test_discovers_nested_manifests() {
        let dir = TempDir::new().unwrap();
        let root = utf8(&dir);
        fs::create_dir_all(root.join("apps/web")).unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();
        fs::write(root.join("apps/web/package.json"), "{}").unwrap();

        let mut dirs = discover_manifest_dirs(&[root.clone()]).unwrap();
        dirs.sort();
        assert_eq!(dirs, vec![root.clone(), root.join("apps/web")]);
    }

    #[test]
    fn test_ignores_vendor_segments() {
        let dir = TempDir::new().unwrap();
        let root = utf8(&dir);
        fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        fs::write(root.join("node_modules/dep/package.json"), "{}").unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();

        let dirs = discover_manifest_dirs(&[root.clone()]).unwrap();
        assert_eq!(dirs, vec![root]);
    }

    #[test]
    fn test_ignores_dotfiles() {
        let dir = TempDir::new().unwrap();
        let root = utf8(&dir);
        fs::create_dir_all(root.join(".cache/pkg")).unwrap();
        fs::write(root.join(".cache/pkg/package.json"), "{}").unwrap();

        let dirs = discover_manifest_dirs(&[root]).unwrap();
        assert!(dirs.is_empty());
    }

    #[test]
    fn test_empty_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let dirs = discover_manifest_dirs(&[utf8(&dir)]).unwrap();
        assert!(dirs.is_empty());
    }
}
