//! The copy-or-transform mirror pipeline.
//!
//! [`MirrorPipeline::process`] is the single entry point for both the
//! initial scan and watch events. Events are classified by looking at the
//! filesystem: a vanished source means unlink, a directory or symlink
//! materializes an output directory, a regular file is copied or
//! transformed. Successful writes notify the restart debouncer; the
//! notification never fires before the write completes.

use std::io::ErrorKind;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use tokio::fs;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use hb_watcher::FileFilter;

use crate::error::MirrorError;
use crate::mapper::PathMapper;
use crate::transform::{TransformGate, Transformer};

/// The incremental mirror pipeline.
///
/// Owned by the event loop; all file operations are serialized at the input
/// side (one path at a time).
#[derive(Debug)]
pub struct MirrorPipeline {
    mapper: PathMapper,
    gate: TransformGate,
    transformer: Transformer,
    /// Restart notifications toward the debouncer.
    restart_tx: mpsc::UnboundedSender<()>,
    /// Raised by the shutdown coordinator; stops the scan and further
    /// enqueueing.
    shutdown_rx: watch::Receiver<bool>,
}

impl MirrorPipeline {
    /// Creates the pipeline.
    #[must_use]
    pub fn new(
        mapper: PathMapper,
        gate: TransformGate,
        transformer: Transformer,
        restart_tx: mpsc::UnboundedSender<()>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            mapper,
            gate,
            transformer,
            restart_tx,
            shutdown_rx,
        }
    }

    /// Processes one source path: mirror it into the output tree, or remove
    /// the output entry if the source vanished.
    ///
    /// # Errors
    ///
    /// Returns a [`MirrorError`]; callers check
    /// [`is_fatal`](MirrorError::is_fatal) to decide between aborting and
    /// logging.
    pub async fn process(&self, path: &Utf8Path) -> Result<(), MirrorError> {
        let Some(out_path) = self.mapper.map(path) else {
            warn!(path = %path, "event outside watch roots");
            return Ok(());
        };

        let meta = match fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return self.unlink(path, &out_path).await;
            }
            Err(source) => return Err(MirrorError::io(path, source)),
        };

        // Directories and symlinks both materialize as output directories;
        // symlinks are never followed into the output tree.
        if meta.is_dir() || meta.file_type().is_symlink() {
            if fs::symlink_metadata(&out_path).await.is_err() {
                fs::create_dir_all(&out_path)
                    .await
                    .map_err(|e| MirrorError::io(&out_path, e))?;
            }
            return Ok(());
        }

        if let Some(gate_path) = self.mapper.gate_path(path) {
            if self.gate.matches(&gate_path) {
                return self.transform_file(path, &out_path).await;
            }
        }

        self.copy_file(path, &out_path).await
    }

    /// Walks the source roots and mirrors every accepted path in discovery
    /// order. Honors the shutdown flag between paths.
    ///
    /// Returns the number of paths processed.
    ///
    /// # Errors
    ///
    /// Propagates walk errors and fatal pipeline errors.
    pub async fn scan<F: FileFilter>(&self, filter: Arc<F>) -> Result<usize, MirrorError> {
        let roots: Vec<Utf8PathBuf> = self.mapper.roots().map(Utf8Path::to_owned).collect();

        // Collect first on the blocking pool, then process serially in
        // discovery order.
        let paths = tokio::task::spawn_blocking(move || collect_paths(&roots, filter))
            .await
            .map_err(|e| MirrorError::io(Utf8PathBuf::from("<scan>"), std::io::Error::other(e)))??;

        let mut processed = 0;
        for path in paths {
            if *self.shutdown_rx.borrow() {
                info!("shutdown requested, stopping initial scan");
                break;
            }
            self.process(&path).await?;
            processed += 1;
        }

        info!(files = processed, "initial scan complete");
        Ok(processed)
    }

    /// Transforms a gated regular file into the output tree.
    async fn transform_file(&self, path: &Utf8Path, out_path: &Utf8Path) -> Result<(), MirrorError> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path, "source vanished before transform, skipping");
                return Ok(());
            }
            Err(source) => return Err(MirrorError::io(path, source)),
        };

        let transformed = self.transformer.apply(path, out_path, &contents).await?;
        self.write_atomic(out_path, transformed.as_bytes()).await?;

        debug!(path = %path, out = %out_path, "transformed");
        self.notify_restart();
        Ok(())
    }

    /// Copies an ungated regular file byte-for-byte.
    async fn copy_file(&self, path: &Utf8Path, out_path: &Utf8Path) -> Result<(), MirrorError> {
        self.ensure_parent(out_path).await?;

        match fs::copy(path, out_path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path, "source vanished before copy, skipping");
                return Ok(());
            }
            Err(source) => return Err(MirrorError::io(path, source)),
        }

        debug!(path = %path, out = %out_path, "copied");
        self.notify_restart();
        Ok(())
    }

    /// Removes the output entry for a vanished source path.
    ///
    /// File removal rebuilds downstream state, so it notifies; directory
    /// removal only logs.
    async fn unlink(&self, path: &Utf8Path, out_path: &Utf8Path) -> Result<(), MirrorError> {
        match fs::symlink_metadata(out_path).await {
            Err(_) => {
                debug!(path = %path, "unlinked source had no output entry");
                Ok(())
            }
            Ok(meta) if meta.is_dir() => {
                fs::remove_dir_all(out_path)
                    .await
                    .map_err(|e| MirrorError::io(out_path, e))?;
                info!(out = %out_path, "removed output directory");
                Ok(())
            }
            Ok(_) => {
                fs::remove_file(out_path)
                    .await
                    .map_err(|e| MirrorError::io(out_path, e))?;
                debug!(out = %out_path, "removed output file");
                self.notify_restart();
                Ok(())
            }
        }
    }

    /// Writes contents to `out_path` atomically: temp file in the same
    /// directory, then rename.
    async fn write_atomic(&self, out_path: &Utf8Path, contents: &[u8]) -> Result<(), MirrorError> {
        self.ensure_parent(out_path).await?;

        let file_name = out_path.file_name().unwrap_or("out");
        let tmp_path = out_path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, contents)
            .await
            .map_err(|e| MirrorError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, out_path)
            .await
            .map_err(|e| MirrorError::io(out_path, e))?;
        Ok(())
    }

    /// Creates the parent directory of an output path if needed.
    async fn ensure_parent(&self, out_path: &Utf8Path) -> Result<(), MirrorError> {
        if let Some(parent) = out_path.parent() {
            if fs::symlink_metadata(parent).await.is_err() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| MirrorError::io(parent, e))?;
            }
        }
        Ok(())
    }

    /// Notifies the restart debouncer of a completed write.
    fn notify_restart(&self) {
        let _ = self.restart_tx.send(());
    }
}

/// Collects accepted paths under the roots in discovery order, pruning
/// rejected directories so excluded vendor trees are never descended.
fn collect_paths<F: FileFilter>(
    roots: &[Utf8PathBuf],
    filter: Arc<F>,
) -> Result<Vec<Utf8PathBuf>, MirrorError> {
    let mut paths = Vec::new();

    for root in roots {
        let entry_filter = Arc::clone(&filter);
        let walker = WalkBuilder::new(root)
            // Mirror the tree exactly as it is; only the filter decides.
            .standard_filters(false)
            .follow_links(false)
            .threads(1)
            .filter_entry(move |entry| match Utf8Path::from_path(entry.path()) {
                Some(path) => entry_filter.should_process(path),
                None => {
                    warn!(path = %entry.path().display(), "skipping non-UTF-8 path");
                    false
                }
            })
            .build();

        for result in walker {
            let entry = result?;
            let Some(path) = Utf8Path::from_path(entry.path()) else {
                continue;
            };
            // The root itself maps to the output root; nothing to do for it.
            if path == root {
                continue;
            }
            paths.push(path.to_owned());
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_watcher::AcceptAllFilter;
    use std::fs as std_fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: Utf8PathBuf,
        out: Utf8PathBuf,
        pipeline: MirrorPipeline,
        restart_rx: mpsc::UnboundedReceiver<()>,
        shutdown_tx: watch::Sender<bool>,
    }

    fn fixture(patterns: &[&str], transformer: Transformer) -> Fixture {
        let dir = TempDir::new().unwrap();
        let base = Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap();
        let root = base.join("src");
        let out = base.join("out");
        std_fs::create_dir_all(&root).unwrap();
        std_fs::create_dir_all(&out).unwrap();

        let mapper = PathMapper::new(
            vec![root.clone()],
            vec![Utf8PathBuf::from("src")],
            out.clone(),
        );
        let gate =
            TransformGate::new(&patterns.iter().map(|p| (*p).to_owned()).collect::<Vec<_>>())
                .unwrap();
        let (restart_tx, restart_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Fixture {
            _dir: dir,
            root,
            out,
            pipeline: MirrorPipeline::new(mapper, gate, transformer, restart_tx, shutdown_rx),
            restart_rx,
            shutdown_tx,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<()>) -> usize {
        let mut n = 0;
        while rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    #[tokio::test]
    async fn test_copy_regular_file() {
        let mut f = fixture(&[], Transformer::Identity);
        std_fs::write(f.root.join("a.txt"), "hi").unwrap();

        f.pipeline.process(&f.root.join("a.txt")).await.unwrap();

        assert_eq!(std_fs::read_to_string(f.out.join("a.txt")).unwrap(), "hi");
        assert_eq!(drain(&mut f.restart_rx), 1);
    }

    #[tokio::test]
    async fn test_copy_creates_parent_dirs() {
        let mut f = fixture(&[], Transformer::Identity);
        std_fs::create_dir_all(f.root.join("b")).unwrap();
        std_fs::write(f.root.join("b/c.txt"), "bye").unwrap();

        f.pipeline.process(&f.root.join("b/c.txt")).await.unwrap();

        assert_eq!(
            std_fs::read_to_string(f.out.join("b/c.txt")).unwrap(),
            "bye"
        );
        assert_eq!(drain(&mut f.restart_rx), 1);
    }

    #[tokio::test]
    async fn test_directory_materializes_without_notify() {
        let mut f = fixture(&[], Transformer::Identity);
        std_fs::create_dir_all(f.root.join("sub")).unwrap();

        f.pipeline.process(&f.root.join("sub")).await.unwrap();

        assert!(f.out.join("sub").is_dir());
        assert_eq!(drain(&mut f.restart_rx), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transform_gated_file() {
        let mut f = fixture(
            &["src/**/*.js"],
            Transformer::Hook(hb_core::CommandLine::parse("tr a-z A-Z", "--using").unwrap()),
        );
        std_fs::write(f.root.join("x.js"), "hi").unwrap();

        f.pipeline.process(&f.root.join("x.js")).await.unwrap();

        assert_eq!(std_fs::read_to_string(f.out.join("x.js")).unwrap(), "HI");
        assert_eq!(drain(&mut f.restart_rx), 1);
    }

    #[tokio::test]
    async fn test_ungated_file_not_transformed() {
        let mut f = fixture(&["src/**/*.js"], Transformer::Identity);
        std_fs::write(f.root.join("notes.txt"), "hi").unwrap();

        f.pipeline.process(&f.root.join("notes.txt")).await.unwrap();

        assert_eq!(
            std_fs::read_to_string(f.out.join("notes.txt")).unwrap(),
            "hi"
        );
        assert_eq!(drain(&mut f.restart_rx), 1);
    }

    #[tokio::test]
    async fn test_unlink_file_notifies() {
        let mut f = fixture(&[], Transformer::Identity);
        std_fs::write(f.root.join("a.txt"), "hi").unwrap();
        f.pipeline.process(&f.root.join("a.txt")).await.unwrap();
        drain(&mut f.restart_rx);

        std_fs::remove_file(f.root.join("a.txt")).unwrap();
        f.pipeline.process(&f.root.join("a.txt")).await.unwrap();

        assert!(!f.out.join("a.txt").exists());
        assert_eq!(drain(&mut f.restart_rx), 1);
    }

    #[tokio::test]
    async fn test_unlink_directory_does_not_notify() {
        let mut f = fixture(&[], Transformer::Identity);
        std_fs::create_dir_all(f.root.join("sub")).unwrap();
        f.pipeline.process(&f.root.join("sub")).await.unwrap();
        drain(&mut f.restart_rx);

        std_fs::remove_dir(f.root.join("sub")).unwrap();
        f.pipeline.process(&f.root.join("sub")).await.unwrap();

        assert!(!f.out.join("sub").exists());
        assert_eq!(drain(&mut f.restart_rx), 0);
    }

    #[tokio::test]
    async fn test_process_is_idempotent() {
        let mut f = fixture(&[], Transformer::Identity);
        std_fs::write(f.root.join("a.txt"), "hi").unwrap();

        f.pipeline.process(&f.root.join("a.txt")).await.unwrap();
        f.pipeline.process(&f.root.join("a.txt")).await.unwrap();

        assert_eq!(std_fs::read_to_string(f.out.join("a.txt")).unwrap(), "hi");
        // Each completed write notifies; coalescing is the debouncer's job.
        assert_eq!(drain(&mut f.restart_rx), 2);
    }

    #[tokio::test]
    async fn test_scan_mirrors_tree_in_order() {
        let mut f = fixture(&[], Transformer::Identity);
        std_fs::write(f.root.join("a.txt"), "hi").unwrap();
        std_fs::create_dir_all(f.root.join("b")).unwrap();
        std_fs::write(f.root.join("b/c.txt"), "bye").unwrap();

        let processed = f.pipeline.scan(Arc::new(AcceptAllFilter)).await.unwrap();

        assert_eq!(processed, 3); // a.txt, b, b/c.txt
        assert_eq!(std_fs::read_to_string(f.out.join("a.txt")).unwrap(), "hi");
        assert_eq!(
            std_fs::read_to_string(f.out.join("b/c.txt")).unwrap(),
            "bye"
        );
        assert!(drain(&mut f.restart_rx) >= 2);
    }

    #[tokio::test]
    async fn test_scan_honors_shutdown_flag() {
        let f = fixture(&[], Transformer::Identity);
        std_fs::write(f.root.join("a.txt"), "hi").unwrap();

        f.shutdown_tx.send(true).unwrap();
        let processed = f.pipeline.scan(Arc::new(AcceptAllFilter)).await.unwrap();

        assert_eq!(processed, 0);
        assert!(!f.out.join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_empty_root_scan() {
        let f = fixture(&[], Transformer::Identity);
        let processed = f.pipeline.scan(Arc::new(AcceptAllFilter)).await.unwrap();
        assert_eq!(processed, 0);
    }
}
