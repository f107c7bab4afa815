//! Conflict-safe relocation of redundant files into an archive root.
//!
//! # Overview
//!
//! [`ArchiveMover`] moves one file per call into a flat archive directory:
//! - The archive root is created (with parents) once, lazily, on the first
//!   real move. An existing directory is fine.
//! - The destination is `archive_root/<file name>`. When that name is taken,
//!   on disk or by another move of the same run, a disambiguated name
//!   `<micros>_<counter>_<file name>` is tried, a bounded number of times.
//!   The stem is shortened when the prefix would push the name past 255
//!   bytes.
//! - Names are claimed under a mutex, so two workers archiving `dup.png`
//!   concurrently can never pick the same destination.
//! - The source is re-checked before moving. A file that vanished or
//!   changed size since the scan is left alone.
//! - The move is a rename, falling back to copy + delete across filesystems.
//!   If any step of the fallback fails, the partial copy is removed and the
//!   source stays in place.
//!
//! Failures are per-file: they are recorded in the [`ArchiveOutcome`] and
//! the batch carries on.
//!
//! In dry-run mode the same destination planning happens (names are still
//! reserved, so the preview shows the disambiguated names a real run would
//! use) but nothing on disk is touched.
//!
//! # Example
//!
//! ```no_run
//! use treeclean::actions::archive::ArchiveMover;
//! use treeclean::scanner::FileEntry;
//! use std::path::{Path, PathBuf};
//!
//! let mover = ArchiveMover::new(Path::new("/tmp/archive"));
//! let entry = FileEntry::new(PathBuf::from("dup.png"), PathBuf::from("/data/dup.png"), 42);
//! let outcome = mover.archive(&entry);
//! println!("{:?} -> {:?}", outcome.status, outcome.destination);
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use serde::Serialize;
use thiserror::Error;

use crate::progress::{ProgressCallback, PHASE_ARCHIVING};
use crate::scanner::FileEntry;
use crate::workers::UnitRunner;

/// Disambiguated names tried before a move fails.
pub const MAX_DISAMBIGUATION_ATTEMPTS: usize = 8;

/// Longest file name, in bytes, accepted by common filesystems.
const NAME_MAX: usize = 255;

/// Error type for archival moves (the MoveFailure class).
#[derive(Debug, Error)]
pub enum MoveError {
    /// The source disappeared after the scan.
    #[error("source missing: {0}")]
    SourceMissing(PathBuf),

    /// The source changed size after the scan.
    #[error("source modified since scan: {path} (size {expected} -> {actual})")]
    SourceModified {
        /// Source path
        path: PathBuf,
        /// Size recorded by the scan
        expected: u64,
        /// Size found before the move
        actual: u64,
    },

    /// The planned destination appeared between planning and moving.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// Every disambiguated name was taken.
    #[error("no free archive name for {name} after {attempts} attempts")]
    DisambiguationExhausted {
        /// Original file name
        name: String,
        /// Attempts made
        attempts: usize,
    },

    /// The archive root could not be created.
    #[error("archive root unavailable: {path}: {reason}")]
    ArchiveRootUnavailable {
        /// Archive root
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Permission denied on the source or the archive root.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl MoveError {
    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::SourceMissing(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Final state of one archival attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MoveStatus {
    /// The file now lives at the destination.
    Moved,
    /// Dry run: the file would have been moved to the destination.
    Planned,
    /// The file was not moved; the source is untouched.
    Failed,
}

impl std::fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Moved => write!(f, "MOVED"),
            Self::Planned => write!(f, "PLANNED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Record of one archival attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveOutcome {
    /// Absolute source path
    pub source: PathBuf,
    /// Destination actually used (or planned). `None` if none was reserved.
    pub destination: Option<PathBuf>,
    /// File size at scan time
    pub size: u64,
    /// Final status
    pub status: MoveStatus,
    /// Cause of a failure
    pub error: Option<String>,
    /// Whether the plain file name was taken and a disambiguated one was used
    pub disambiguated: bool,
}

impl ArchiveOutcome {
    fn failed(entry: &FileEntry, destination: Option<PathBuf>, error: &MoveError) -> Self {
        Self {
            source: entry.absolute_path.clone(),
            destination,
            size: entry.size,
            status: MoveStatus::Failed,
            error: Some(error.to_string()),
            disambiguated: false,
        }
    }

    /// `true` unless the attempt failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status != MoveStatus::Failed
    }
}

/// Results of a batch of archival moves.
#[derive(Debug, Clone, Default)]
pub struct ArchiveBatch {
    /// One outcome per attempted move, in input order
    pub outcomes: Vec<ArchiveOutcome>,
    /// Files moved
    pub moved: usize,
    /// Files planned (dry run)
    pub planned: usize,
    /// Files that failed
    pub failed: usize,
    /// Bytes moved or planned
    pub bytes_reclaimed: u64,
    /// Whether the batch stopped early on a shutdown request
    pub interrupted: bool,
}

impl ArchiveBatch {
    /// Human-readable summary of the batch.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.planned > 0 { "Would archive" } else { "Archived" };
        let count = self.moved + self.planned;
        if self.failed == 0 {
            format!("{verb} {count} file(s), {} bytes", self.bytes_reclaimed)
        } else {
            format!(
                "{verb} {count} file(s), {} failed, {} bytes",
                self.failed, self.bytes_reclaimed
            )
        }
    }
}

/// Moves files into a single archive root.
///
/// Shared by reference across worker threads; all mutable state is behind
/// atomics or a mutex.
#[derive(Debug)]
pub struct ArchiveMover {
    root: PathBuf,
    dry_run: bool,
    root_ready: OnceLock<Result<(), String>>,
    reservations: Mutex<HashSet<PathBuf>>,
    counter: AtomicU64,
}

impl ArchiveMover {
    /// Create a mover targeting `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            dry_run: false,
            root_ready: OnceLock::new(),
            reservations: Mutex::new(HashSet::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Plan moves without touching the filesystem.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The archive root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the archive root once per mover. Later calls return the
    /// first result.
    ///
    /// # Errors
    ///
    /// [`MoveError::ArchiveRootUnavailable`] if the directory cannot be created.
    pub fn ensure_root(&self) -> Result<(), MoveError> {
        let ready = self.root_ready.get_or_init(|| {
            fs::create_dir_all(&self.root).map_err(|e| e.to_string())?;
            log::info!("Archive root ready: {}", self.root.display());
            Ok(())
        });
        ready
            .clone()
            .map_err(|reason| MoveError::ArchiveRootUnavailable {
                path: self.root.clone(),
                reason,
            })
    }

    /// Archive one file. Never panics and never returns early: every
    /// failure is captured in the outcome.
    pub fn archive(&self, entry: &FileEntry) -> ArchiveOutcome {
        match self.try_archive(entry) {
            Ok(outcome) => outcome,
            Err((destination, error)) => {
                log::warn!(
                    "Failed to archive {}: {}",
                    entry.absolute_path.display(),
                    error
                );
                ArchiveOutcome::failed(entry, destination, &error)
            }
        }
    }

    fn try_archive(
        &self,
        entry: &FileEntry,
    ) -> Result<ArchiveOutcome, (Option<PathBuf>, MoveError)> {
        if !self.dry_run {
            self.ensure_root().map_err(|e| (None, e))?;
        }
        verify_source(entry).map_err(|e| (None, e))?;

        let (destination, disambiguated) = self.reserve_destination(entry).map_err(|e| (None, e))?;

        let status = if self.dry_run {
            MoveStatus::Planned
        } else {
            move_file(&entry.absolute_path, &destination)
                .map_err(|e| (Some(destination.clone()), e))?;
            log::debug!(
                "Archived {} -> {}",
                entry.absolute_path.display(),
                destination.display()
            );
            MoveStatus::Moved
        };

        Ok(ArchiveOutcome {
            source: entry.absolute_path.clone(),
            destination: Some(destination),
            size: entry.size,
            status,
            error: None,
            disambiguated,
        })
    }

    /// Claim a destination name for `entry`.
    ///
    /// The reservation lock is held while the filesystem is checked, so
    /// claims are serialized across workers.
    fn reserve_destination(&self, entry: &FileEntry) -> Result<(PathBuf, bool), MoveError> {
        let name = entry
            .file_name()
            .ok_or_else(|| MoveError::SourceMissing(entry.absolute_path.clone()))?
            .to_string_lossy()
            .into_owned();

        let mut reserved = self
            .reservations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let plain = self.root.join(&name);
        if is_free(&plain, &reserved) {
            reserved.insert(plain.clone());
            return Ok((plain, false));
        }

        for _ in 0..MAX_DISAMBIGUATION_ATTEMPTS {
            let candidate = self.root.join(self.disambiguated_name(&name));
            if is_free(&candidate, &reserved) {
                log::debug!("Name collision for {}, using {}", name, candidate.display());
                reserved.insert(candidate.clone());
                return Ok((candidate, true));
            }
        }

        Err(MoveError::DisambiguationExhausted {
            name,
            attempts: MAX_DISAMBIGUATION_ATTEMPTS,
        })
    }

    fn disambiguated_name(&self, name: &str) -> String {
        let micros = chrono::Utc::now().timestamp_micros();
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        fit_name(&format!("{micros}_{sequence}_"), name)
    }

    /// Archive `entries` on a bounded pool.
    ///
    /// `on_outcome` is called from worker threads as each move finishes,
    /// with the entry's index in `entries`; it is the hook for streaming
    /// report rows.
    pub fn archive_all<F>(
        &self,
        entries: &[&FileEntry],
        threads: usize,
        shutdown: Option<&AtomicBool>,
        progress: Option<&dyn ProgressCallback>,
        on_outcome: F,
    ) -> ArchiveBatch
    where
        F: Fn(usize, &ArchiveOutcome) + Sync,
    {
        let indexed: Vec<(usize, &FileEntry)> = entries.iter().copied().enumerate().collect();
        log::info!("Phase 4: Archiving {} files into {}", indexed.len(), self.root.display());

        let results = UnitRunner::new(PHASE_ARCHIVING, threads)
            .with_shutdown(shutdown)
            .with_progress(progress)
            .run(
                &indexed,
                |(_, entry)| entry.relative_path.to_string_lossy().into_owned(),
                |&(index, entry)| {
                    let outcome = self.archive(entry);
                    on_outcome(index, &outcome);
                    outcome
                },
            );

        let mut batch = ArchiveBatch::default();
        for result in results {
            let Some(outcome) = result else {
                batch.interrupted = true;
                continue;
            };
            match outcome.status {
                MoveStatus::Moved => batch.moved += 1,
                MoveStatus::Planned => batch.planned += 1,
                MoveStatus::Failed => batch.failed += 1,
            }
            if outcome.is_success() {
                batch.bytes_reclaimed += outcome.size;
            }
            batch.outcomes.push(outcome);
        }

        log::info!("{}", batch.summary());
        batch
    }
}

fn is_free(candidate: &Path, reserved: &HashSet<PathBuf>) -> bool {
    !reserved.contains(candidate) && fs::symlink_metadata(candidate).is_err()
}

fn verify_source(entry: &FileEntry) -> Result<(), MoveError> {
    let metadata = fs::symlink_metadata(&entry.absolute_path)
        .map_err(|e| MoveError::from_io(&entry.absolute_path, e))?;
    if !metadata.is_file() {
        return Err(MoveError::SourceMissing(entry.absolute_path.clone()));
    }
    if metadata.len() != entry.size {
        return Err(MoveError::SourceModified {
            path: entry.absolute_path.clone(),
            expected: entry.size,
            actual: metadata.len(),
        });
    }
    Ok(())
}

fn is_cross_device(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::CrossesDevices {
        return true;
    }
    match err.raw_os_error() {
        Some(18) => !cfg!(windows), // POSIX EXDEV
        Some(17) => cfg!(windows),  // ERROR_NOT_SAME_DEVICE
        _ => false,
    }
}

/// Move `source` to `destination`, never overwriting.
fn move_file(source: &Path, destination: &Path) -> Result<(), MoveError> {
    if fs::symlink_metadata(destination).is_ok() {
        return Err(MoveError::DestinationExists(destination.to_path_buf()));
    }

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            log::debug!(
                "Cross-device move, copying {} -> {}",
                source.display(),
                destination.display()
            );
            copy_then_remove(source, destination)
        }
        Err(err) => Err(MoveError::from_io(source, err)),
    }
}

fn copy_then_remove(source: &Path, destination: &Path) -> Result<(), MoveError> {
    let copied = fs::copy(source, destination)
        .and_then(|_| fs::File::open(destination)?.sync_all());
    if let Err(e) = copied {
        let _ = fs::remove_file(destination);
        return Err(MoveError::Io {
            path: destination.to_path_buf(),
            source: e,
        });
    }
    if let Err(e) = fs::remove_file(source) {
        // Leave exactly one copy: the untouched source
        let _ = fs::remove_file(destination);
        return Err(MoveError::from_io(source, e));
    }
    Ok(())
}

/// `prefix` + `name`, shortening the stem of `name` so the result stays
/// within [`NAME_MAX`] bytes. The extension survives when it fits.
fn fit_name(prefix: &str, name: &str) -> String {
    let room = NAME_MAX.saturating_sub(prefix.len());
    if name.len() <= room {
        return format!("{prefix}{name}");
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot < room => name.split_at(dot),
        _ => (name, ""),
    };
    let budget = room - ext.len();
    let cut = (0..=budget)
        .rev()
        .find(|&i| stem.is_char_boundary(i))
        .unwrap_or(0);
    format!("{prefix}{}{ext}", &stem[..cut])
}
