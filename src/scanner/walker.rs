//! Directory walker built on jwalk.
//!
//! # Overview
//!
//! [`Walker`] enumerates every regular file under a root and produces
//! [`FileEntry`] values carrying the root-relative path, the absolute path
//! and the size. Content is never read here; hashing happens lazily later.
//!
//! # Ordering
//!
//! Children of every directory are sorted by file name before jwalk yields
//! them, so the output order is the same lexical, depth-first order on every
//! run over an unchanged tree. Duplicate resolution relies on this: the
//! first entry in scan order is the canonical survivor.
//!
//! # Filtering
//!
//! - Any path segment matching the ignore set prunes that file or subtree
//! - Excluded roots (e.g. an archive folder inside the scan root) are pruned
//! - File names with an excluded prefix (`._`, `~$`) are skipped
//! - An optional extension allow-list restricts the result
//! - Symlinks and non-regular files are skipped
//!
//! A failure to stat one entry is yielded as a [`ScanError`] and the walk
//! continues.
//!
//! # Example
//!
//! ```no_run
//! use treeclean::scanner::{ScanConfig, Walker};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), ScanConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.relative_path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

use super::path_utils::{absolutize, is_within};
use super::{FileEntry, ScanConfig, ScanError};
use crate::progress::{ProgressCallback, PHASE_SCANNING};

/// Result of a complete scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Entries in scan order
    pub entries: Vec<Arc<FileEntry>>,
    /// Entries that could not be stat'ed or listed
    pub errors: Vec<ScanError>,
    /// Whether the scan stopped early on a shutdown request
    pub interrupted: bool,
}

impl ScanOutcome {
    /// Sum of the sizes of all scanned entries.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Directory walker for file discovery.
pub struct Walker {
    root: PathBuf,
    config: ScanConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given root.
    #[must_use]
    pub fn new(root: &Path, config: ScanConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Stop between entries once `flag` becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Report each discovered file to `callback`.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the tree lazily.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. The iterator ends early if shutdown is requested.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let root = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());

        let prune_excluded: Vec<PathBuf> = self
            .config
            .excluded_roots
            .iter()
            .map(|p| absolutize(p).unwrap_or_else(|_| p.clone()))
            .collect();
        let prune_config = self.config.clone();

        let walk_dir = WalkDir::new(&root)
            .follow_links(false)
            .skip_hidden(false)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Pruned directories are never descended into
                children.retain(|child| match child {
                    Ok(entry) => {
                        if prune_config.is_ignored_segment(entry.file_name()) {
                            return false;
                        }
                        let path = entry.path();
                        !prune_excluded.iter().any(|ex| is_within(&path, ex))
                    }
                    Err(_) => true,
                });
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .take_while(move |_| {
                let stop = self.is_shutdown_requested();
                if stop {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                }
                !stop
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if entry.depth == 0 {
                        return None;
                    }
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }
                    let path = entry.path();
                    if file_type.is_symlink() {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }
                    self.process_file(&root, path)
                }
                Err(e) => {
                    let path = e.path().map_or_else(|| root.clone(), Path::to_path_buf);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    Some(Err(ScanError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    }))
                }
            })
    }

    fn process_file(&self, root: &Path, path: PathBuf) -> Option<Result<FileEntry, ScanError>> {
        let file_name = path.file_name()?;
        if self.config.has_excluded_prefix(file_name) {
            log::trace!("Skipping marker file: {}", path.display());
            return None;
        }
        if !self.config.passes_extension_filter(&path) {
            return None;
        }

        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                let err = ScanError::from_io(&path, e);
                log::warn!("Skipping unreadable entry: {}", err);
                return Some(Err(err));
            }
        };
        if !metadata.is_file() {
            log::trace!("Skipping non-regular file: {}", path.display());
            return None;
        }

        let relative = path.strip_prefix(root).ok()?.to_path_buf();
        Some(Ok(FileEntry::new(relative, path, metadata.len())))
    }

    /// Walk the whole tree and collect entries and errors.
    ///
    /// Entries keep the walk order and are wrapped in `Arc` so later phases
    /// can share them across worker threads.
    #[must_use]
    pub fn scan(&self) -> ScanOutcome {
        if let Some(cb) = &self.progress_callback {
            cb.on_phase_start(PHASE_SCANNING, 0);
        }

        let mut outcome = ScanOutcome::default();
        for result in self.walk() {
            match result {
                Ok(entry) => {
                    if let Some(cb) = &self.progress_callback {
                        cb.on_progress(
                            outcome.entries.len() + 1,
                            &entry.relative_path.to_string_lossy(),
                        );
                    }
                    outcome.entries.push(Arc::new(entry));
                }
                Err(e) => outcome.errors.push(e),
            }
        }
        outcome.interrupted = self.is_shutdown_requested();

        if let Some(cb) = &self.progress_callback {
            cb.on_phase_end(PHASE_SCANNING);
        }
        log::info!(
            "Phase 1 complete: {} files under {} ({} errors)",
            outcome.entries.len(),
            self.root.display(),
            outcome.errors.len()
        );
        outcome
    }
}
