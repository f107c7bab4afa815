//! End-to-end cleanup run.
//!
//! [`CleanupEngine::run`] drives the pipeline in a fixed order:
//!
//! 1. validate the [`RunConfig`] (the only fatal failure point)
//! 2. scan the tree, skipping the archive root
//! 3. resolve KEEP/MOVE decisions
//! 4. write the KEEP rows
//! 5. archive the MOVE entries, writing each row as its move finishes
//! 6. summarize
//!
//! Per-file failures never abort the run; they are counted in the
//! [`RunSummary`] and recorded in the report.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::actions::ArchiveMover;
use crate::config::{ConfigError, RunConfig};
use crate::duplicates::{
    DuplicateResolver, FilenameIdentityExtractor, IdentityExtractor, ResolutionStrategy,
    ResolveError, ResolverConfig,
};
use crate::error::ExitCode;
use crate::output::{ReportError, ReportRow, ReportSink};
use crate::progress::ProgressCallback;
use crate::scanner::{FileEntry, Walker};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration, detected before scanning.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The report could not be written.
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// The identity pattern did not compile.
    #[error("invalid identity pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Resolution could not run.
    #[error("resolution failed: {0}")]
    Resolve(ResolveError),

    /// Shutdown was requested before archival started.
    #[error("run interrupted before archival")]
    Interrupted,
}

impl From<ResolveError> for EngineError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Interrupted => Self::Interrupted,
            other => Self::Resolve(other),
        }
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Root that was scanned
    pub scan_root: PathBuf,
    /// Archive root used (or planned)
    pub archive_root: PathBuf,
    /// Strategy applied
    pub strategy: ResolutionStrategy,
    /// Files scanned
    pub total_scanned: usize,
    /// Bytes scanned
    pub total_bytes: u64,
    /// Entries that could not be scanned
    pub scan_errors: usize,
    /// Entries flagged for archival
    pub flagged: usize,
    /// Entries kept
    pub kept: usize,
    /// Sum of sizes of flagged entries
    pub bytes_flagged: u64,
    /// Upper bound from size grouping, before any hashing
    pub potential_savings: u64,
    /// Files actually moved
    pub archived: usize,
    /// Files planned in a dry run
    pub planned: usize,
    /// Failed moves
    pub archive_failures: usize,
    /// Files that could not be hashed
    pub hash_failures: usize,
    /// Files with no extractable identity
    pub extraction_failures: usize,
    /// Bytes moved (or planned in a dry run)
    pub bytes_reclaimed: u64,
    /// No filesystem mutation was performed
    pub dry_run: bool,
    /// Archival stopped early on a shutdown request
    pub interrupted: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    /// Number of per-file failures of any kind.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.scan_errors + self.hash_failures + self.archive_failures
    }

    /// Exit code for this run.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.interrupted {
            ExitCode::Interrupted
        } else if self.failures() > 0 {
            ExitCode::PartialSuccess
        } else if self.flagged == 0 {
            ExitCode::NothingFlagged
        } else {
            ExitCode::Success
        }
    }
}

/// Runs a complete cleanup.
pub struct CleanupEngine {
    config: RunConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
    extractor: Option<Arc<dyn IdentityExtractor>>,
}

impl std::fmt::Debug for CleanupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupEngine")
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress_callback", &self.progress_callback.is_some())
            .field("extractor", &self.extractor.is_some())
            .finish()
    }
}

impl CleanupEngine {
    /// Create an engine for `config`.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            shutdown_flag: None,
            progress_callback: None,
            extractor: None,
        }
    }

    /// Check `flag` between units of work.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Report progress to `callback`.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Use `extractor` for version-aware runs instead of the file-name one.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn IdentityExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute the run, writing every decision to `sink`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Config`] before any scanning if the roots are invalid
    /// - [`EngineError::Interrupted`] if shutdown is requested before
    ///   archival starts (nothing has been moved)
    /// - [`EngineError::Report`] if the sink fails; when that happens during
    ///   archival the batch still completes first
    pub fn run(&self, sink: &mut dyn ReportSink) -> Result<RunSummary, EngineError> {
        let start = Instant::now();
        self.config.validate()?;

        log::info!(
            "Cleaning {} ({} strategy{}), archive root {}",
            self.config.scan_root.display(),
            self.config.resolution_strategy,
            if self.config.dry_run { ", dry run" } else { "" },
            self.config.archive_root.display()
        );

        let mut walker = Walker::new(&self.config.scan_root, self.config.scan_config());
        if let Some(flag) = &self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(cb) = &self.progress_callback {
            walker = walker.with_progress_callback(Arc::clone(cb));
        }
        let scan = walker.scan();
        if scan.interrupted {
            return Err(EngineError::Interrupted);
        }

        let resolver = self.build_resolver()?;
        let resolution = resolver.resolve(&scan.entries)?;

        for decision in resolution.kept() {
            sink.record(&ReportRow::from_decision(decision))?;
        }

        let flagged: Vec<_> = resolution.flagged().collect();
        let entries: Vec<&FileEntry> = flagged.iter().map(|d| d.entry.as_ref()).collect();
        let mover = ArchiveMover::new(&self.config.archive_root).with_dry_run(self.config.dry_run);

        let shared_sink = Mutex::new(&mut *sink);
        let report_error: Mutex<Option<ReportError>> = Mutex::new(None);
        let batch = mover.archive_all(
            &entries,
            self.config.io_threads,
            self.shutdown_flag.as_deref(),
            self.progress_callback.as_deref(),
            |index, outcome| {
                let row = ReportRow::from_decision(flagged[index]).with_outcome(outcome);
                let result = match shared_sink.lock() {
                    Ok(mut guard) => guard.record(&row),
                    Err(poisoned) => poisoned.into_inner().record(&row),
                };
                if let Err(e) = result {
                    log::error!("Failed to record {}: {}", row.source, e);
                    if let Ok(mut slot) = report_error.lock() {
                        slot.get_or_insert(e);
                    }
                }
            },
        );

        drop(shared_sink);
        if let Some(e) = report_error.into_inner().ok().flatten() {
            return Err(e.into());
        }
        sink.finish()?;

        if batch.interrupted {
            log::warn!(
                "Archival interrupted: {} of {} flagged files were not attempted",
                flagged.len() - batch.outcomes.len(),
                flagged.len()
            );
        }

        let stats = &resolution.stats;
        let summary = RunSummary {
            scan_root: self.config.scan_root.clone(),
            archive_root: self.config.archive_root.clone(),
            strategy: self.config.resolution_strategy,
            total_scanned: scan.entries.len(),
            total_bytes: scan.total_bytes(),
            scan_errors: scan.errors.len(),
            flagged: stats.flagged,
            kept: stats.kept,
            bytes_flagged: stats.bytes_flagged,
            potential_savings: stats.grouping.potential_savings,
            archived: batch.moved,
            planned: batch.planned,
            archive_failures: batch.failed,
            hash_failures: stats.hash_failures,
            extraction_failures: stats.extraction_failures,
            bytes_reclaimed: batch.bytes_reclaimed,
            dry_run: self.config.dry_run,
            interrupted: batch.interrupted,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        log::info!(
            "Run complete: {} scanned, {} flagged, {} archived, {} failed",
            summary.total_scanned,
            summary.flagged,
            summary.archived + summary.planned,
            summary.archive_failures
        );
        Ok(summary)
    }

    fn build_resolver(&self) -> Result<DuplicateResolver, EngineError> {
        let mut config = ResolverConfig::default()
            .with_strategy(self.config.resolution_strategy)
            .with_comparator(self.config.comparator)
            .with_io_threads(self.config.io_threads);
        if let Some(flag) = &self.shutdown_flag {
            config = config.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(cb) = &self.progress_callback {
            config = config.with_progress_callback(Arc::clone(cb));
        }

        let mut resolver = DuplicateResolver::new(config);
        if self.config.resolution_strategy == ResolutionStrategy::VersionAware {
            let extractor = match &self.extractor {
                Some(e) => Arc::clone(e),
                None => Arc::new(FilenameIdentityExtractor::new()?),
            };
            resolver = resolver.with_extractor(extractor);
        }
        Ok(resolver)
    }
}
