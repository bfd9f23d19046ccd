//! Path normalization helpers.
//!
//! The prod-dep resolver, filter, and path mapper all compare paths for
//! membership and prefix relationships. Those comparisons are lexical, so
//! every path entering the system is first *absolutized*: joined onto the
//! process working directory and normalized by folding `.` and `..`
//! components. Symlinks are deliberately not resolved; presence on disk at
//! the spelled path is the source of truth.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Lexically normalizes a path by folding `.` and `..` components.
///
/// Unlike `canonicalize`, this never touches the filesystem and never
/// resolves symlinks. Leading `..` components that would escape the root of
/// a relative path are preserved.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use hb_core::paths::normalize;
///
/// assert_eq!(normalize(Utf8Path::new("/a/b/../c/./d")), "/a/c/d");
/// assert_eq!(normalize(Utf8Path::new("a//b/")), "a/b");
/// ```
#[must_use]
pub fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();

    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Utf8Component::Normal(_))
                );
                if popped {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_str()),
        }
    }

    out
}

/// Absolutizes a path against the process working directory.
///
/// Relative paths are joined onto the current directory; the result is
/// lexically normalized with [`normalize`]. Symlinks are not resolved.
///
/// # Errors
///
/// Returns an I/O error if the current directory cannot be determined or is
/// not valid UTF-8.
pub fn absolutize(path: &Utf8Path) -> std::io::Result<Utf8PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }

    let cwd = std::env::current_dir()?;
    let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|p| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("working directory is not valid UTF-8: {}", p.display()),
        )
    })?;

    Ok(normalize(&cwd.join(path)))
}
