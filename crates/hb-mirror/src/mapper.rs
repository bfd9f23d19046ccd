//! Source path to output path mapping.
//!
//! Each watched file is known by its path relative to its source root; the
//! output path is that remainder joined under the output root. The root
//! segment itself is stripped, so `src/a/b.txt` lands at `out/a/b.txt`.

use camino::{Utf8Path, Utf8PathBuf};

/// One watched source root with the label it was configured under.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceRoot {
    /// Absolutized root path; event paths are matched against this.
    abs: Utf8PathBuf,
    /// The root exactly as the user spelled it; transform globs match
    /// against `label/rest…`.
    label: Utf8PathBuf,
}

/// Maps source paths to output paths.
///
/// # Examples
///
/// ```
/// use camino::{Utf8Path, Utf8PathBuf};
/// use hb_mirror::PathMapper;
///
/// let mapper = PathMapper::new(
///     vec![Utf8PathBuf::from("/repo/src")],
///     vec![Utf8PathBuf::from("src")],
///     Utf8PathBuf::from("/repo/out"),
/// );
///
/// assert_eq!(
///     mapper.map(Utf8Path::new("/repo/src/b/c.txt")),
///     Some(Utf8PathBuf::from("/repo/out/b/c.txt")),
/// );
/// assert_eq!(
///     mapper.gate_path(Utf8Path::new("/repo/src/b/c.txt")),
///     Some("src/b/c.txt".to_owned()),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct PathMapper {
    roots: Vec<SourceRoot>,
    output: Utf8PathBuf,
}

impl PathMapper {
    /// Creates a mapper over absolutized roots, their user-facing labels,
    /// and the output root. `roots` and `labels` are parallel.
    #[must_use]
    pub fn new(roots: Vec<Utf8PathBuf>, labels: Vec<Utf8PathBuf>, output: Utf8PathBuf) -> Self {
        let roots = roots
            .into_iter()
            .zip(labels)
            .map(|(abs, label)| SourceRoot { abs, label })
            .collect();
        Self { roots, output }
    }

    /// Maps a source path to its output path.
    ///
    /// Returns `None` for paths under none of the watched roots.
    #[must_use]
    pub fn map(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        let (_, rest) = self.split(path)?;
        Some(self.output.join(rest))
    }

    /// Returns the forward-slash, label-prefixed relative form of a source
    /// path, the form transform globs are matched against.
    #[must_use]
    pub fn gate_path(&self, path: &Utf8Path) -> Option<String> {
        let (root, rest) = self.split(path)?;
        let joined = root.label.join(rest);
        Some(joined.as_str().replace('\\', "/"))
    }

    /// The absolutized source roots, in configuration order.
    pub fn roots(&self) -> impl Iterator<Item = &Utf8Path> {
        self.roots.iter().map(|r| r.abs.as_path())
    }

    /// The output root.
    #[must_use]
    pub fn output(&self) -> &Utf8Path {
        &self.output
    }

    /// Finds the root that prefixes `path` and the remainder under it.
    fn split<'a>(&self, path: &'a Utf8Path) -> Option<(&SourceRoot, &'a Utf8Path)> {
        self.roots
            .iter()
            .find_map(|root| path.strip_prefix(&root.abs).ok().map(|rest| (root, rest)))
    }
}
