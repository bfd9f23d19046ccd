//! Event types for file change notifications.
//!
//! The debouncer intentionally abstracts away create/modify/delete detail;
//! the mirror pipeline classifies each event by looking at the filesystem
//! when it processes the path.

use std::time::Instant;

use camino::Utf8PathBuf;

/// A file change event with a UTF-8 path guarantee.
///
/// # Examples
///
/// ```
/// use hb_watcher::FileEvent;
/// use camino::Utf8PathBuf;
///
/// let event = FileEvent::new(Utf8PathBuf::from("/repo/src/a.txt"));
/// assert_eq!(event.path.as_str(), "/repo/src/a.txt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// The absolute path of the file that changed.
    pub path: Utf8PathBuf,

    /// Monotonic timestamp of when the event was received.
    pub timestamp: Instant,
}

impl FileEvent {
    /// Creates a new file event for the given path, stamped now.
    #[inline]
    #[must_use]
    pub fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            timestamp: Instant::now(),
        }
    }

    /// Returns the file name without the directory path.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}
