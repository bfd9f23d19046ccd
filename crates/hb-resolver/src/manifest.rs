//! Package manifest model.
//!
//! Only the fields the resolver consumes are modeled: the package name (for
//! diagnostics) and the direct-dependencies map. Everything else in the
//! manifest is ignored, including version ranges; presence on disk decides
//! what participates in the build.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::ResolveError;

/// The manifest file name looked up inside package folders.
pub const MANIFEST_FILE: &str = "package.json";

/// A parsed package manifest.
///
/// # Examples
///
/// ```
/// use hb_resolver::PackageManifest;
///
/// let manifest: PackageManifest = serde_json::from_str(
///     r#"{"name": "app", "dependencies": {"left-pad": "^1.0.0"}}"#,
/// ).unwrap();
/// assert_eq!(manifest.name.as_deref(), Some("app"));
/// assert_eq!(manifest.dependency_names().collect::<Vec<_>>(), vec!["left-pad"]);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    /// The package name. Manifests without a name still contribute
    /// dependency edges.
    #[serde(default)]
    pub name: Option<String>,

    /// Direct dependencies: name to version range. The range is never
    /// consulted.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Loads and parses the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Read`] or [`ResolveError::Parse`] with the
    /// offending path.
    pub fn load(path: &Utf8Path) -> Result<Self, ResolveError> {
        let raw = fs::read_to_string(path).map_err(|source| ResolveError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ResolveError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Loads the manifest inside a package folder, or `None` if the folder
    /// has no manifest file.
    ///
    /// # Errors
    ///
    /// Propagates read and parse failures for manifests that do exist.
    pub fn load_from_dir(dir: &Utf8Path) -> Result<Option<Self>, ResolveError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Returns the manifest path for a package folder.
    #[must_use]
    pub fn path_in(dir: &Utf8Path) -> Utf8PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Iterates the direct-dependency names in deterministic order.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal() {
        let manifest: PackageManifest = serde_json::from_str("{}").unwrap();
        assert!(manifest.name.is_none());
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_parse_dependencies_ordered() {
        let manifest: PackageManifest = serde_json::from_str(
            r#"{"dependencies": {"zeta": "1", "alpha": "2"}}"#,
        )
        .unwrap();
        let names: Vec<_> = manifest.dependency_names().collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_load_from_dir_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap();
        assert!(PackageManifest::load_from_dir(path).unwrap().is_none());
    }

    #[test]
    fn test_load_from_dir_parses() {
        let dir = TempDir::new().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(
            path.join(MANIFEST_FILE),
            r#"{"name": "pkg", "dependencies": {"dep": "*"}}"#,
        )
        .unwrap();

        let manifest = PackageManifest::load_from_dir(path).unwrap().unwrap();
        assert_eq!(manifest.name.as_deref(), Some("pkg"));
        assert!(manifest.dependencies.contains_key("dep"));
    }

    #[test]
    fn test_load_invalid_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap();
        let manifest_path = path.join(MANIFEST_FILE);
        fs::write(&manifest_path, "not json").unwrap();

        let err = PackageManifest::load(&manifest_path).unwrap_err();
        assert!(matches!(err, ResolveError::Parse { .. }));
    }
}
