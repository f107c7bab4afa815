//! Duplicate resolution: who stays, who goes to the archive.
//!
//! # Overview
//!
//! The resolver turns a scanned tree into exactly one
//! [`ResolutionDecision`] per entry. It runs in three steps:
//!
//! 1. **Bucketing** - entries are grouped by size; only multi-member
//!    buckets are ever hashed (see [`crate::duplicates::groups`]).
//! 2. **Parallel fan-out** - hashes (and, for the version-aware strategy,
//!    logical identities) are computed on a bounded worker pool. Results
//!    are re-joined by scan position, never by completion order.
//! 3. **Deterministic merge** - a single thread walks the entries in scan
//!    order and applies the strategy. All seen-hash and seen-name state lives
//!    in this step and is dropped when it returns.
//!
//! # Strategies
//!
//! - [`ResolutionStrategy::Exact`]: inside each bucket the first entry with a
//!   given hash is kept; later identical entries are moved, each pointing at
//!   the first one.
//! - [`ResolutionStrategy::VersionAware`]: entries are checked against the
//!   kept set by hash first, then by logical name. A strictly newer version
//!   flips the earlier keeper to MOVE. Entries without an identity are kept
//!   and never registered.
//!
//! Files that cannot be read are kept, as are zero-byte files. A resolver
//! never moves a file it could not make a safe claim about.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::groups::{bucket_by_size, GroupingStats, SizeBucket};
use super::identity::{ExtractionFailure, IdentityExtractor, LogicalIdentity, VersionComparator};
use crate::progress::{ProgressCallback, PHASE_EXTRACTING, PHASE_HASHING};
use crate::scanner::{FileEntry, Hash, HashError, Hasher};
use crate::workers::UnitRunner;

/// How redundancy is decided.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Byte-identical content only.
    #[default]
    Exact,
    /// Identical content, or same logical name with an older version.
    VersionAware,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::VersionAware => write!(f, "version-aware"),
        }
    }
}

/// Outcome of resolution for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Leave the file where it is.
    Keep,
    /// Relocate the file to the archive root.
    Move,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => write!(f, "KEEP"),
            Self::Move => write!(f, "MOVE"),
        }
    }
}

/// Why a verdict was reached. Rendered into the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// No other file has this size.
    UniqueSize,
    /// Zero-byte files are not considered.
    EmptyFile,
    /// First entry in scan order with this content.
    FirstSeen,
    /// Same content as an earlier entry (exact strategy).
    IdenticalContent {
        /// The kept entry
        original: PathBuf,
    },
    /// Same content as a kept entry (version-aware strategy).
    ExactDuplicate {
        /// The kept entry
        original: PathBuf,
    },
    /// A later entry carries a strictly newer version of the same name.
    SupersededByNewerVersion {
        /// Path of the newer entry
        newer: PathBuf,
        /// Version of the newer entry
        newer_version: String,
        /// Version of this entry
        version: String,
    },
    /// Kept after replacing an older version.
    SupersedesOlderVersion {
        /// Identity of the kept entry
        identity: LogicalIdentity,
    },
    /// An equal or newer version is already kept.
    OlderOrEqualVersion {
        /// Path of the kept entry
        present: PathBuf,
        /// Version of the kept entry
        present_version: String,
        /// Version of this entry
        version: String,
    },
    /// First entry with this name and content.
    NewIdentity {
        /// Identity registered for the entry
        identity: LogicalIdentity,
    },
    /// Metadata extraction failed; no equivalence claim is possible.
    IdentityUnavailable(String),
    /// The file could not be read for hashing.
    Unreadable(String),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UniqueSize => write!(f, "unique size"),
            Self::EmptyFile => write!(f, "empty file"),
            Self::FirstSeen => write!(f, "first occurrence"),
            Self::IdenticalContent { original } => {
                write!(f, "identical content to {}", original.display())
            }
            Self::ExactDuplicate { original } => {
                write!(f, "exact duplicate of {}", original.display())
            }
            Self::SupersededByNewerVersion {
                newer,
                newer_version,
                version,
            } => write!(
                f,
                "superseded by newer version {} at {} (this: {})",
                newer_version,
                newer.display(),
                version
            ),
            Self::SupersedesOlderVersion { identity } => {
                write!(f, "newest version of {identity}")
            }
            Self::OlderOrEqualVersion {
                present,
                present_version,
                version,
            } => write!(
                f,
                "older or equal version already present: {} at {} (this: {})",
                present_version,
                present.display(),
                version
            ),
            Self::NewIdentity { identity } => write!(f, "new identity {identity}"),
            Self::IdentityUnavailable(e) => write!(f, "identity unavailable: {e}"),
            Self::Unreadable(e) => write!(f, "unreadable: {e}"),
        }
    }
}

/// The decision for a single entry.
#[derive(Debug, Clone)]
pub struct ResolutionDecision {
    /// The entry decided on
    pub entry: Arc<FileEntry>,
    /// KEEP or MOVE
    pub verdict: Verdict,
    /// Human-readable justification
    pub reason: Reason,
    /// For MOVE: the surviving KEEP entry this one is redundant against.
    ///
    /// In version-aware runs a keeper can later lose to a newer version;
    /// everything that had lost to it is then re-pointed at the new keeper,
    /// while `reason` still names the entry it was compared with.
    pub conflict_source: Option<Arc<FileEntry>>,
}

impl ResolutionDecision {
    fn keep(entry: &Arc<FileEntry>, reason: Reason) -> Self {
        Self {
            entry: Arc::clone(entry),
            verdict: Verdict::Keep,
            reason,
            conflict_source: None,
        }
    }

    fn moved(entry: &Arc<FileEntry>, reason: Reason, source: &Arc<FileEntry>) -> Self {
        Self {
            entry: Arc::clone(entry),
            verdict: Verdict::Move,
            reason,
            conflict_source: Some(Arc::clone(source)),
        }
    }

    /// `true` for MOVE decisions.
    #[must_use]
    pub fn is_move(&self) -> bool {
        self.verdict == Verdict::Move
    }

    /// Reason rendered as text.
    #[must_use]
    pub fn reason_text(&self) -> String {
        self.reason.to_string()
    }
}

/// Configuration for a resolver.
#[derive(Clone)]
pub struct ResolverConfig {
    /// Strategy applied in the merge step
    pub strategy: ResolutionStrategy,
    /// Version ordering for the version-aware strategy
    pub comparator: VersionComparator,
    /// Worker threads for hashing and extraction. Default 4.
    pub io_threads: usize,
    /// Optional shutdown flag for cooperative cancellation
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress observer
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("strategy", &self.strategy)
            .field("comparator", &self.comparator)
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategy: ResolutionStrategy::Exact,
            comparator: VersionComparator::Structured,
            io_threads: 4,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl ResolverConfig {
    /// Set the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the version comparator.
    #[must_use]
    pub fn with_comparator(mut self, comparator: VersionComparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Set the worker thread count (minimum 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the shutdown flag for graceful termination.
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

    fn runner<'a>(&'a self, phase: &'a str) -> UnitRunner<'a> {
        UnitRunner::new(phase, self.io_threads)
            .with_shutdown(self.shutdown_flag.as_deref())
            .with_progress(self.progress_callback.as_deref())
    }
}

/// Errors that abort resolution as a whole.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Shutdown was requested before every unit was processed.
    #[error("resolution interrupted")]
    Interrupted,

    /// The version-aware strategy needs an identity extractor.
    #[error("version-aware resolution requires an identity extractor")]
    MissingExtractor,
}

/// Counters collected during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    /// Size bucketing statistics
    pub grouping: GroupingStats,
    /// Fingerprints successfully computed
    pub hashed: usize,
    /// Entries kept because hashing failed
    pub hash_failures: usize,
    /// Entries kept because no identity could be extracted
    pub extraction_failures: usize,
    /// Entries decided KEEP
    pub kept: usize,
    /// Entries decided MOVE
    pub flagged: usize,
    /// Sum of sizes of MOVE entries
    pub bytes_flagged: u64,
}

/// Result of a resolution pass: one decision per entry, in scan order.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Decisions index-aligned with the input entries
    pub decisions: Vec<ResolutionDecision>,
    /// Counters
    pub stats: ResolutionStats,
}

impl Resolution {
    /// MOVE decisions in scan order.
    pub fn flagged(&self) -> impl Iterator<Item = &ResolutionDecision> {
        self.decisions.iter().filter(|d| d.is_move())
    }

    /// KEEP decisions in scan order.
    pub fn kept(&self) -> impl Iterator<Item = &ResolutionDecision> {
        self.decisions.iter().filter(|d| !d.is_move())
    }
}

enum HashSlot {
    NotNeeded,
    Hashed(Hash),
    Failed(String),
}

/// Decides KEEP/MOVE for scanned entries.
///
/// # Example
///
/// ```no_run
/// use treeclean::duplicates::{DuplicateResolver, ResolverConfig};
/// use treeclean::scanner::{ScanConfig, Walker};
/// use std::path::Path;
///
/// let scan = Walker::new(Path::new("."), ScanConfig::default()).scan();
/// let resolution = DuplicateResolver::new(ResolverConfig::default())
///     .resolve(&scan.entries)
///     .unwrap();
/// for d in resolution.flagged() {
///     println!("{} -> {}", d.entry.relative_path.display(), d.reason_text());
/// }
/// ```
pub struct DuplicateResolver {
    config: ResolverConfig,
    hasher: Arc<Hasher>,
    extractor: Option<Arc<dyn IdentityExtractor>>,
}

impl std::fmt::Debug for DuplicateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateResolver")
            .field("config", &self.config)
            .field("hasher", &self.hasher)
            .field("extractor", &self.extractor.as_ref().map(|_| "<extractor>"))
            .finish()
    }
}

impl DuplicateResolver {
    /// Create a resolver with its own hasher.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            hasher: Arc::new(Hasher::new()),
            extractor: None,
        }
    }

    /// Share an existing hasher (and its counters).
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<Hasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Set the identity extractor used by the version-aware strategy.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn IdentityExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// The hasher used for fingerprints.
    #[must_use]
    pub fn hasher(&self) -> &Arc<Hasher> {
        &self.hasher
    }

    /// The resolver configuration.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve every entry.
    ///
    /// `entries` must be in scan order; that order decides which copy
    /// survives.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::MissingExtractor`] for the version-aware strategy
    ///   without an extractor
    /// - [`ResolveError::Interrupted`] if shutdown was requested before all
    ///   hashes or identities were available. No decision is returned in
    ///   that case, so nothing can be archived on partial information.
    pub fn resolve(&self, entries: &[Arc<FileEntry>]) -> Result<Resolution, ResolveError> {
        let extractor = match self.config.strategy {
            ResolutionStrategy::VersionAware => Some(
                self.extractor
                    .as_ref()
                    .ok_or(ResolveError::MissingExtractor)?,
            ),
            ResolutionStrategy::Exact => None,
        };

        let (buckets, grouping) = bucket_by_size(entries);

        let targets: Vec<usize> = buckets
            .iter()
            .flat_map(|b| b.positions.iter().copied())
            .collect();
        log::info!("Phase 2: Hashing {} candidate files", targets.len());
        let hashes = self.hash_positions(entries, &targets)?;

        let mut stats = ResolutionStats {
            grouping,
            ..ResolutionStats::default()
        };
        for slot in &hashes {
            match slot {
                HashSlot::Hashed(_) => stats.hashed += 1,
                HashSlot::Failed(_) => stats.hash_failures += 1,
                HashSlot::NotNeeded => {}
            }
        }

        let decisions = match extractor {
            None => merge_exact(entries, &buckets, &hashes),
            Some(extractor) => {
                let identities = self.extract_identities(entries, extractor.as_ref())?;
                stats.extraction_failures = identities
                    .iter()
                    .filter(|r| matches!(r, Some(Err(_))))
                    .count();
                merge_version_aware(entries, &hashes, &identities, self.config.comparator)
            }
        };

        for d in &decisions {
            if d.is_move() {
                stats.flagged += 1;
                stats.bytes_flagged += d.entry.size;
            } else {
                stats.kept += 1;
            }
        }

        log::info!(
            "Phase 3 complete: {} flagged ({} bytes), {} kept, {} unreadable",
            stats.flagged,
            stats.bytes_flagged,
            stats.kept,
            stats.hash_failures
        );

        Ok(Resolution { decisions, stats })
    }

    fn hash_positions(
        &self,
        entries: &[Arc<FileEntry>],
        targets: &[usize],
    ) -> Result<Vec<HashSlot>, ResolveError> {
        let results = self.config.runner(PHASE_HASHING).run(
            targets,
            |&pos| entries[pos].relative_path.to_string_lossy().into_owned(),
            |&pos| {
                let entry = &entries[pos];
                let result = self.hasher.fingerprint_entry(entry);
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_item_completed(entry.size);
                }
                result
            },
        );

        let mut slots: Vec<HashSlot> = entries.iter().map(|_| HashSlot::NotNeeded).collect();
        for (&pos, result) in targets.iter().zip(results) {
            match result {
                None => return Err(ResolveError::Interrupted),
                Some(Ok(hash)) => slots[pos] = HashSlot::Hashed(hash),
                Some(Err(e)) => {
                    log::warn!("Failed to hash {}: {}", entries[pos].absolute_path.display(), e);
                    slots[pos] = HashSlot::Failed(describe_hash_error(&e));
                }
            }
        }

        if self.config.is_shutdown_requested() {
            return Err(ResolveError::Interrupted);
        }
        Ok(slots)
    }

    fn extract_identities(
        &self,
        entries: &[Arc<FileEntry>],
        extractor: &dyn IdentityExtractor,
    ) -> Result<Vec<Option<Result<LogicalIdentity, ExtractionFailure>>>, ResolveError> {
        let targets: Vec<usize> = (0..entries.len()).filter(|&i| entries[i].size > 0).collect();
        log::info!("Extracting identities for {} files", targets.len());

        let results = self.config.runner(PHASE_EXTRACTING).run(
            &targets,
            |&pos| entries[pos].relative_path.to_string_lossy().into_owned(),
            |&pos| extractor.extract_identity(&entries[pos].absolute_path),
        );

        let mut identities: Vec<Option<Result<LogicalIdentity, ExtractionFailure>>> =
            entries.iter().map(|_| None).collect();
        for (&pos, result) in targets.iter().zip(results) {
            let result = result.ok_or(ResolveError::Interrupted)?;
            if let Err(e) = &result {
                log::debug!("No identity: {}", e);
            }
            identities[pos] = Some(result);
        }

        if self.config.is_shutdown_requested() {
            return Err(ResolveError::Interrupted);
        }
        Ok(identities)
    }
}

fn describe_hash_error(error: &HashError) -> String {
    match error {
        HashError::NotFound(_) => "file vanished".to_string(),
        HashError::PermissionDenied(_) => "permission denied".to_string(),
        HashError::Io { source, .. } => source.to_string(),
    }
}

fn initial_decisions(entries: &[Arc<FileEntry>]) -> Vec<ResolutionDecision> {
    entries
        .iter()
        .map(|e| {
            let reason = if e.size == 0 {
                Reason::EmptyFile
            } else {
                Reason::UniqueSize
            };
            ResolutionDecision::keep(e, reason)
        })
        .collect()
}

fn merge_exact(
    entries: &[Arc<FileEntry>],
    buckets: &[SizeBucket],
    hashes: &[HashSlot],
) -> Vec<ResolutionDecision> {
    let mut decisions = initial_decisions(entries);

    for bucket in buckets {
        let mut first_seen: HashMap<Hash, usize> = HashMap::new();
        for (pos, entry) in bucket.iter() {
            decisions[pos] = match &hashes[pos] {
                HashSlot::Failed(cause) => {
                    ResolutionDecision::keep(entry, Reason::Unreadable(cause.clone()))
                }
                HashSlot::NotNeeded => ResolutionDecision::keep(entry, Reason::UniqueSize),
                HashSlot::Hashed(hash) => match first_seen.get(hash) {
                    Some(&original) => {
                        let source = &entries[original];
                        log::debug!(
                            "Duplicate: {} == {}",
                            entry.relative_path.display(),
                            source.relative_path.display()
                        );
                        ResolutionDecision::moved(
                            entry,
                            Reason::IdenticalContent {
                                original: source.relative_path.clone(),
                            },
                            source,
                        )
                    }
                    None => {
                        first_seen.insert(*hash, pos);
                        ResolutionDecision::keep(entry, Reason::FirstSeen)
                    }
                },
            };
        }
    }

    decisions
}

fn merge_version_aware(
    entries: &[Arc<FileEntry>],
    hashes: &[HashSlot],
    identities: &[Option<Result<LogicalIdentity, ExtractionFailure>>],
    comparator: VersionComparator,
) -> Vec<ResolutionDecision> {
    let mut decisions = initial_decisions(entries);
    let mut kept_by_hash: HashMap<Hash, usize> = HashMap::new();
    let mut kept_by_name: HashMap<String, (String, usize)> = HashMap::new();
    // keeper position -> positions moved against it
    let mut losers: HashMap<usize, Vec<usize>> = HashMap::new();

    for (pos, entry) in entries.iter().enumerate() {
        if entry.size == 0 {
            continue;
        }
        let hash = match &hashes[pos] {
            HashSlot::Failed(cause) => {
                decisions[pos] = ResolutionDecision::keep(entry, Reason::Unreadable(cause.clone()));
                continue;
            }
            HashSlot::Hashed(h) => Some(*h),
            HashSlot::NotNeeded => None,
        };
        let identity = match &identities[pos] {
            Some(Ok(identity)) => identity.clone(),
            Some(Err(e)) => {
                decisions[pos] =
                    ResolutionDecision::keep(entry, Reason::IdentityUnavailable(e.to_string()));
                continue;
            }
            None => continue,
        };

        // 1. exact duplicate of a kept entry
        if let Some(&keeper) = hash.as_ref().and_then(|h| kept_by_hash.get(h)) {
            let source = &entries[keeper];
            decisions[pos] = ResolutionDecision::moved(
                entry,
                Reason::ExactDuplicate {
                    original: source.relative_path.clone(),
                },
                source,
            );
            losers.entry(keeper).or_default().push(pos);
            continue;
        }

        // 2. same name as a kept entry
        if let Some((kept_version, keeper)) = kept_by_name.get(&identity.name).cloned() {
            if comparator.is_newer(&identity.version, &kept_version) {
                let old = &entries[keeper];
                log::debug!(
                    "{} {} supersedes {} at {}",
                    identity.name,
                    identity.version,
                    kept_version,
                    old.relative_path.display()
                );
                decisions[keeper] = ResolutionDecision::moved(
                    old,
                    Reason::SupersededByNewerVersion {
                        newer: entry.relative_path.clone(),
                        newer_version: identity.version.clone(),
                        version: kept_version,
                    },
                    entry,
                );
                let mut inherited = losers.remove(&keeper).unwrap_or_default();
                for &loser in &inherited {
                    decisions[loser].conflict_source = Some(Arc::clone(entry));
                }
                inherited.push(keeper);
                losers.insert(pos, inherited);
                kept_by_hash.retain(|_, idx| *idx != keeper);
                if let Some(h) = hash {
                    kept_by_hash.insert(h, pos);
                }
                kept_by_name.insert(identity.name.clone(), (identity.version.clone(), pos));
                decisions[pos] =
                    ResolutionDecision::keep(entry, Reason::SupersedesOlderVersion { identity });
            } else {
                let source = &entries[keeper];
                decisions[pos] = ResolutionDecision::moved(
                    entry,
                    Reason::OlderOrEqualVersion {
                        present: source.relative_path.clone(),
                        present_version: kept_version,
                        version: identity.version.clone(),
                    },
                    source,
                );
                losers.entry(keeper).or_default().push(pos);
            }
            continue;
        }

        // 3. new content, new name
        if let Some(h) = hash {
            kept_by_hash.insert(h, pos);
        }
        kept_by_name.insert(identity.name.clone(), (identity.version.clone(), pos));
        decisions[pos] = ResolutionDecision::keep(entry, Reason::NewIdentity { identity });
    }

    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> Arc<FileEntry> {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        Arc::new(FileEntry::new(PathBuf::from(name), path, content.len() as u64))
    }

    struct StemExtractor;

    impl IdentityExtractor for StemExtractor {
        fn extract_identity(&self, path: &Path) -> Result<LogicalIdentity, ExtractionFailure> {
            let stem = path.file_stem().unwrap().to_str().unwrap();
            match stem.split_once('@') {
                Some((name, version)) => Ok(LogicalIdentity::new(name, version)),
                None => Err(ExtractionFailure::NoIdentity(path.to_path_buf())),
            }
        }
    }

    fn version_resolver() -> DuplicateResolver {
        DuplicateResolver::new(
            ResolverConfig::default().with_strategy(ResolutionStrategy::VersionAware),
        )
        .with_extractor(Arc::new(StemExtractor))
    }

    #[test]
    fn test_exact_scenario_unique_size_not_hashed() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            write(&dir, "a.txt", b"0123456789"),
            write(&dir, "b.txt", b"0123456789"),
            write(&dir, "c.txt", b"01234567890123456789"),
        ];
        let resolver = DuplicateResolver::new(ResolverConfig::default());
        let res = resolver.resolve(&entries).unwrap();

        assert_eq!(res.decisions[0].verdict, Verdict::Keep);
        assert_eq!(res.decisions[1].verdict, Verdict::Move);
        assert_eq!(res.decisions[1].reason_text(), "identical content to a.txt");
        assert!(Arc::ptr_eq(
            res.decisions[1].conflict_source.as_ref().unwrap(),
            &entries[0]
        ));
        assert_eq!(res.decisions[2].reason, Reason::UniqueSize);
        assert!(entries[2].content_hash().is_none());
        assert_eq!(resolver.hasher().hashes_computed(), 2);
        assert_eq!(res.stats.flagged, 1);
        assert_eq!(res.stats.bytes_flagged, 10);
    }

    #[test]
    fn test_exact_same_size_different_content() {
        let dir = TempDir::new().unwrap();
        let entries = vec![write(&dir, "a", b"aaaa"), write(&dir, "b", b"bbbb")];
        let res = DuplicateResolver::new(ResolverConfig::default())
            .resolve(&entries)
            .unwrap();
        assert!(res.decisions.iter().all(|d| d.verdict == Verdict::Keep));
        assert!(res.decisions.iter().all(|d| d.reason == Reason::FirstSeen));
    }

    #[test]
    fn test_exact_three_copies_point_to_first() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            write(&dir, "x/1.bin", b"same"),
            write(&dir, "x/2.bin", b"same"),
            write(&dir, "y/3.bin", b"same"),
        ];
        let res = DuplicateResolver::new(ResolverConfig::default().with_io_threads(2))
            .resolve(&entries)
            .unwrap();
        for d in res.flagged() {
            assert!(Arc::ptr_eq(d.conflict_source.as_ref().unwrap(), &entries[0]));
        }
        assert_eq!(res.flagged().count(), 2);
        assert_eq!(res.kept().count(), 1);
    }

    #[test]
    fn test_empty_files_are_kept_and_not_hashed() {
        let dir = TempDir::new().unwrap();
        let entries = vec![write(&dir, "e1", b""), write(&dir, "e2", b"")];
        let resolver = DuplicateResolver::new(ResolverConfig::default());
        let res = resolver.resolve(&entries).unwrap();
        assert!(res.decisions.iter().all(|d| d.reason == Reason::EmptyFile));
        assert_eq!(resolver.hasher().hashes_computed(), 0);
    }

    #[test]
    fn test_unreadable_file_is_kept() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a", b"data");
        let ghost = Arc::new(FileEntry::new(
            PathBuf::from("ghost"),
            dir.path().join("ghost"),
            4,
        ));
        let res = DuplicateResolver::new(ResolverConfig::default())
            .resolve(&[a, ghost])
            .unwrap();
        assert!(matches!(res.decisions[1].reason, Reason::Unreadable(_)));
        assert_eq!(res.decisions[1].verdict, Verdict::Keep);
        assert_eq!(res.stats.hash_failures, 1);
    }

    #[test]
    fn test_interrupted_resolution_returns_error() {
        let dir = TempDir::new().unwrap();
        let entries = vec![write(&dir, "a", b"data"), write(&dir, "b", b"data")];
        let flag = Arc::new(AtomicBool::new(true));
        let result = DuplicateResolver::new(ResolverConfig::default().with_shutdown_flag(flag))
            .resolve(&entries);
        assert_eq!(result.unwrap_err(), ResolveError::Interrupted);
    }

    #[test]
    fn test_version_aware_newer_supersedes() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            write(&dir, "Arial@1.0.ttf", b"old glyphs"),
            write(&dir, "Arial@2.0.ttf", b"new glyphs!"),
        ];
        let res = version_resolver().resolve(&entries).unwrap();

        assert_eq!(res.decisions[0].verdict, Verdict::Move);
        assert!(res.decisions[0]
            .reason_text()
            .starts_with("superseded by newer version 2.0"));
        assert!(Arc::ptr_eq(
            res.decisions[0].conflict_source.as_ref().unwrap(),
            &entries[1]
        ));
        assert_eq!(res.decisions[1].verdict, Verdict::Keep);
    }

    #[test]
    fn test_version_aware_older_is_moved() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            write(&dir, "Arial@10.0.ttf", b"ten"),
            write(&dir, "Arial@9.0.ttf", b"nine"),
        ];
        let res = version_resolver().resolve(&entries).unwrap();
        assert_eq!(res.decisions[0].verdict, Verdict::Keep);
        assert_eq!(res.decisions[1].verdict, Verdict::Move);
        assert!(matches!(
            res.decisions[1].reason,
            Reason::OlderOrEqualVersion { .. }
        ));
    }

    #[test]
    fn test_version_aware_lexical_comparator() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            write(&dir, "Arial@10.0.ttf", b"ten"),
            write(&dir, "Arial@9.0.ttf", b"nine"),
        ];
        let res = DuplicateResolver::new(
            ResolverConfig::default()
                .with_strategy(ResolutionStrategy::VersionAware)
                .with_comparator(VersionComparator::Lexical),
        )
        .with_extractor(Arc::new(StemExtractor))
        .resolve(&entries)
        .unwrap();
        assert_eq!(res.decisions[0].verdict, Verdict::Move);
        assert_eq!(res.decisions[1].verdict, Verdict::Keep);
    }

    #[test]
    fn test_version_aware_exact_duplicate_first() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            write(&dir, "a/Font@1.ttf", b"glyphs"),
            write(&dir, "b/Other@5.ttf", b"glyphs"),
        ];
        let res = version_resolver().resolve(&entries).unwrap();
        assert_eq!(res.decisions[1].verdict, Verdict::Move);
        assert!(matches!(res.decisions[1].reason, Reason::ExactDuplicate { .. }));
    }

    #[test]
    fn test_version_aware_extraction_failure_keeps() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            write(&dir, "plain.ttf", b"glyphs"),
            write(&dir, "copy.ttf", b"glyphs"),
        ];
        let res = version_resolver().resolve(&entries).unwrap();
        assert!(res.decisions.iter().all(|d| d.verdict == Verdict::Keep));
        assert!(res
            .decisions
            .iter()
            .all(|d| matches!(d.reason, Reason::IdentityUnavailable(_))));
        assert_eq!(res.stats.extraction_failures, 2);
    }

    #[test]
    fn test_version_aware_requires_extractor() {
        let resolver = DuplicateResolver::new(
            ResolverConfig::default().with_strategy(ResolutionStrategy::VersionAware),
        );
        assert_eq!(
            resolver.resolve(&[]).unwrap_err(),
            ResolveError::MissingExtractor
        );
    }

    #[test]
    fn test_version_aware_single_keeper_per_name() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            write(&dir, "F@2.ttf", b"two"),
            write(&dir, "F@3.ttf", b"three"),
            write(&dir, "F@1.ttf", b"1"),
            write(&dir, "F@4.ttf", b"four!"),
        ];
        let res = version_resolver().resolve(&entries).unwrap();
        let kept: Vec<_> = res
            .kept()
            .map(|d| d.entry.relative_path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(kept, vec!["F@4.ttf"]);
    }

    #[test]
    fn test_version_aware_copy_of_new_keeper_is_exact_duplicate() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            write(&dir, "a/Font@1.0.ttf", b"v1"),
            write(&dir, "a/Font@2.0.ttf", b"v2 glyphs"),
            // Different identity, so only the hash can match it
            write(&dir, "b/Backup@0.1.ttf", b"v2 glyphs"),
        ];
        let res = version_resolver().resolve(&entries).unwrap();

        assert_eq!(res.decisions[0].verdict, Verdict::Move);
        assert_eq!(res.decisions[1].verdict, Verdict::Keep);
        assert_eq!(res.decisions[2].verdict, Verdict::Move);
        assert_eq!(
            res.decisions[2].reason,
            Reason::ExactDuplicate {
                original: PathBuf::from("a/Font@2.0.ttf")
            }
        );
        assert!(Arc::ptr_eq(
            res.decisions[2].conflict_source.as_ref().unwrap(),
            &entries[1]
        ));
    }

    #[test]
    fn test_version_aware_losers_follow_the_final_keeper() {
        let dir = TempDir::new().unwrap();
        let entries = vec![
            write(&dir, "a/Font@2.0.ttf", b"two"),
            write(&dir, "b/Font@1.0.ttf", b"one"),
            write(&dir, "c/Font@2.0.ttf", b"two"),
            write(&dir, "d/Font@3.0.ttf", b"three"),
        ];
        let res = version_resolver().resolve(&entries).unwrap();

        let kept: Vec<_> = res.kept().map(|d| Arc::clone(&d.entry)).collect();
        assert_eq!(kept.len(), 1);
        assert!(Arc::ptr_eq(&kept[0], &entries[3]));

        for decision in &res.decisions[..3] {
            assert_eq!(decision.verdict, Verdict::Move);
            assert!(Arc::ptr_eq(
                decision.conflict_source.as_ref().unwrap(),
                &entries[3]
            ));
        }
        // Reasons still describe the comparison that was made
        assert!(matches!(
            res.decisions[0].reason,
            Reason::SupersededByNewerVersion { .. }
        ));
        assert_eq!(
            res.decisions[2].reason,
            Reason::ExactDuplicate {
                original: PathBuf::from("a/Font@2.0.ttf")
            }
        );
        assert!(res.decisions[1]
            .reason_text()
            .contains("a/Font@2.0.ttf"));
    }
}
