//! Tree diffing.
//!
//! # Overview
//!
//! [`TreeDiffer`] compares two independently scanned trees path by path.
//! The union of root-relative paths drives iteration, in sorted order:
//!
//! | present in | sizes | status |
//! |---|---|---|
//! | A only | - | [`DiffStatus::OnlyA`] |
//! | B only | - | [`DiffStatus::OnlyB`] |
//! | both | differ | [`DiffStatus::Differs`], with the signed delta B - A |
//! | both | equal | [`DiffStatus::Identical`] |
//!
//! Equal size is a heuristic. In strict mode every equal-size pair (except
//! empty files) is also hashed, and a hash mismatch turns `Identical` into
//! `Differs`. Pairs are hashed on the bounded worker pool.
//!
//! Paths are compared after NFC normalization, so a tree copied from macOS
//! (NFD names) lines up with the same tree on Linux.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::ExitCode;
use crate::progress::{ProgressCallback, PHASE_DIFFING};
use crate::scanner::path_utils::relative_key;
use crate::scanner::{FileEntry, HashError, Hasher, ScanConfig, Walker};
use crate::workers::UnitRunner;

/// Classification of one relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffStatus {
    /// Present only in tree A
    OnlyA,
    /// Present only in tree B
    OnlyB,
    /// Present in both, sizes or (strict mode) content differ
    Differs,
    /// Present in both, considered equal
    Identical,
}

impl DiffStatus {
    /// The status seen from the other side.
    #[must_use]
    pub fn mirrored(self) -> Self {
        match self {
            Self::OnlyA => Self::OnlyB,
            Self::OnlyB => Self::OnlyA,
            other => other,
        }
    }
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnlyA => write!(f, "ONLY_A"),
            Self::OnlyB => write!(f, "ONLY_B"),
            Self::Differs => write!(f, "DIFFERS"),
            Self::Identical => write!(f, "IDENTICAL"),
        }
    }
}

/// Result for one relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRecord {
    /// NFC-normalized, `/`-separated relative path
    pub relative_path: String,
    /// Classification
    pub status: DiffStatus,
    /// Size in tree A
    pub size_a: Option<u64>,
    /// Size in tree B
    pub size_b: Option<u64>,
    /// B minus A, when present in both
    pub size_delta: Option<i64>,
    /// Strict mode found equal sizes but different content
    pub hash_mismatch: bool,
}

/// Aggregate counts for a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Files scanned in A
    pub files_a: usize,
    /// Files scanned in B
    pub files_b: usize,
    /// Paths only in A
    pub only_a: usize,
    /// Paths only in B
    pub only_b: usize,
    /// Paths that differ
    pub differs: usize,
    /// Paths considered identical
    pub identical: usize,
    /// Equal-size pairs whose content was compared
    pub hashed_pairs: usize,
    /// Pairs that could not be hashed (left as identical)
    pub hash_failures: usize,
    /// Entries that could not be scanned in either tree
    pub scan_errors: usize,
    /// Files whose NFC key was already taken by a sibling in the same tree
    pub key_collisions: usize,
}

impl DiffSummary {
    /// Number of paths flagged as ONLY_A, ONLY_B or DIFFERS.
    #[must_use]
    pub fn flagged(&self) -> usize {
        self.only_a + self.only_b + self.differs
    }

    /// `true` when the trees are considered equal.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.flagged() == 0
    }

    /// Exit code for this comparison.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.hash_failures > 0 || self.scan_errors > 0 {
            ExitCode::PartialSuccess
        } else if self.is_clean() {
            ExitCode::NothingFlagged
        } else {
            ExitCode::Success
        }
    }
}

/// Records in relative-path order plus counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffReport {
    /// One record per relative path
    pub records: Vec<DiffRecord>,
    /// Counts
    pub summary: DiffSummary,
}

impl DiffReport {
    /// Records that are not identical.
    pub fn differences(&self) -> impl Iterator<Item = &DiffRecord> {
        self.records
            .iter()
            .filter(|r| r.status != DiffStatus::Identical)
    }
}

/// Errors that abort a comparison.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    /// Shutdown was requested during scanning or hashing.
    #[error("comparison interrupted")]
    Interrupted,
}

/// Configuration for [`TreeDiffer`].
#[derive(Clone)]
pub struct DiffConfig {
    /// Hash equal-size pairs
    pub strict: bool,
    /// Worker threads for strict hashing. Default 4.
    pub io_threads: usize,
    /// Optional shutdown flag
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress observer
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for DiffConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffConfig")
            .field("strict", &self.strict)
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            strict: false,
            io_threads: 4,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl DiffConfig {
    /// Enable or disable content hashing of equal-size pairs.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the worker thread count (minimum 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
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
}

/// Compares two scanned trees.
#[derive(Debug)]
pub struct TreeDiffer {
    config: DiffConfig,
    hasher: Arc<Hasher>,
}

impl TreeDiffer {
    /// Create a differ with its own hasher.
    #[must_use]
    pub fn new(config: DiffConfig) -> Self {
        Self {
            config,
            hasher: Arc::new(Hasher::new()),
        }
    }

    /// The hasher used in strict mode.
    #[must_use]
    pub fn hasher(&self) -> &Arc<Hasher> {
        &self.hasher
    }

    /// Classify every relative path found in `a` or `b`.
    ///
    /// # Errors
    ///
    /// [`DiffError::Interrupted`] if shutdown is requested while strict
    /// hashing is in progress.
    pub fn diff(
        &self,
        a: &[Arc<FileEntry>],
        b: &[Arc<FileEntry>],
    ) -> Result<DiffReport, DiffError> {
        let (map_a, collisions_a) = index_by_key(a);
        let (map_b, collisions_b) = index_by_key(b);
        let keys: BTreeSet<&String> = map_a.keys().chain(map_b.keys()).collect();

        let mut summary = DiffSummary {
            files_a: a.len(),
            files_b: b.len(),
            key_collisions: collisions_a + collisions_b,
            ..DiffSummary::default()
        };
        let mut records = Vec::with_capacity(keys.len());
        let mut pending: Vec<(usize, &FileEntry, &FileEntry)> = Vec::new();

        for key in keys {
            let record = match (map_a.get(key), map_b.get(key)) {
                (Some(ea), None) => DiffRecord {
                    relative_path: key.clone(),
                    status: DiffStatus::OnlyA,
                    size_a: Some(ea.size),
                    size_b: None,
                    size_delta: None,
                    hash_mismatch: false,
                },
                (None, Some(eb)) => DiffRecord {
                    relative_path: key.clone(),
                    status: DiffStatus::OnlyB,
                    size_a: None,
                    size_b: Some(eb.size),
                    size_delta: None,
                    hash_mismatch: false,
                },
                (Some(ea), Some(eb)) => {
                    let delta = eb.size as i64 - ea.size as i64;
                    let status = if delta == 0 {
                        if self.config.strict && ea.size > 0 {
                            pending.push((records.len(), ea, eb));
                        }
                        DiffStatus::Identical
                    } else {
                        DiffStatus::Differs
                    };
                    DiffRecord {
                        relative_path: key.clone(),
                        status,
                        size_a: Some(ea.size),
                        size_b: Some(eb.size),
                        size_delta: Some(delta),
                        hash_mismatch: false,
                    }
                }
                (None, None) => continue,
            };
            records.push(record);
        }

        if !pending.is_empty() {
            self.compare_content(&pending, &mut records, &mut summary)?;
        }

        for record in &records {
            match record.status {
                DiffStatus::OnlyA => summary.only_a += 1,
                DiffStatus::OnlyB => summary.only_b += 1,
                DiffStatus::Differs => summary.differs += 1,
                DiffStatus::Identical => summary.identical += 1,
            }
        }

        log::info!(
            "Diff complete: {} only in A, {} only in B, {} differ, {} identical",
            summary.only_a,
            summary.only_b,
            summary.differs,
            summary.identical
        );
        Ok(DiffReport { records, summary })
    }

    fn compare_content(
        &self,
        pending: &[(usize, &FileEntry, &FileEntry)],
        records: &mut [DiffRecord],
        summary: &mut DiffSummary,
    ) -> Result<(), DiffError> {
        log::info!("Strict mode: hashing {} equal-size pairs", pending.len());

        let results = UnitRunner::new(PHASE_DIFFING, self.config.io_threads)
            .with_shutdown(self.config.shutdown_flag.as_deref())
            .with_progress(self.config.progress_callback.as_deref())
            .run(
                pending,
                |(_, ea, _)| ea.relative_path.to_string_lossy().into_owned(),
                |(_, ea, eb)| -> Result<bool, HashError> {
                    let ha = self.hasher.fingerprint_entry(ea)?;
                    let hb = self.hasher.fingerprint_entry(eb)?;
                    Ok(ha != hb)
                },
            );

        for (&(idx, ea, _), result) in pending.iter().zip(results) {
            match result {
                None => return Err(DiffError::Interrupted),
                Some(Ok(mismatch)) => {
                    summary.hashed_pairs += 1;
                    if mismatch {
                        records[idx].status = DiffStatus::Differs;
                        records[idx].hash_mismatch = true;
                    }
                }
                Some(Err(e)) => {
                    log::warn!(
                        "Cannot compare content of {}: {}",
                        ea.relative_path.display(),
                        e
                    );
                    summary.hash_failures += 1;
                }
            }
        }

        if self.config.is_shutdown_requested() {
            return Err(DiffError::Interrupted);
        }
        Ok(())
    }
}

/// Index entries by their NFC key.
///
/// Two files in one tree can fold to the same key (a composed and a
/// decomposed spelling stored side by side). The later one is keyed by its
/// raw path instead, with a `#n` suffix if that is taken too, so it still
/// gets its own record. Returns the number of such collisions.
fn index_by_key(entries: &[Arc<FileEntry>]) -> (BTreeMap<String, &FileEntry>, usize) {
    let mut map = BTreeMap::new();
    let mut collisions = 0;
    for entry in entries {
        let key = relative_key(&entry.relative_path);
        if !map.contains_key(&key) {
            map.insert(key, entry.as_ref());
            continue;
        }

        collisions += 1;
        let raw = raw_key(&entry.relative_path);
        let mut fallback = raw.clone();
        let mut n = 1;
        while map.contains_key(&fallback) {
            fallback = format!("{raw}#{n}");
            n += 1;
        }
        log::warn!(
            "{} normalizes to the same path as another file; reported as {}",
            entry.relative_path.display(),
            fallback
        );
        map.insert(fallback, entry.as_ref());
    }
    (map, collisions)
}

fn raw_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Scan both roots with `scan_config` and compare them.
///
/// # Errors
///
/// [`DiffError::Interrupted`] if shutdown is requested during either scan
/// or during strict hashing.
pub fn diff_trees(
    root_a: &Path,
    root_b: &Path,
    scan_config: &ScanConfig,
    config: DiffConfig,
) -> Result<DiffReport, DiffError> {
    let scan = |root: &Path| {
        let mut walker = Walker::new(root, scan_config.clone());
        if let Some(flag) = &config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(cb) = &config.progress_callback {
            walker = walker.with_progress_callback(Arc::clone(cb));
        }
        walker.scan()
    };

    let scan_a = scan(root_a);
    let scan_b = scan(root_b);
    if scan_a.interrupted || scan_b.interrupted {
        return Err(DiffError::Interrupted);
    }

    let mut report = TreeDiffer::new(config).diff(&scan_a.entries, &scan_b.entries)?;
    report.summary.scan_errors = scan_a.errors.len() + scan_b.errors.len();
    Ok(report)
}
