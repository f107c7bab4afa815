//! Report rows and the sink they are written to.
//!
//! A run produces one [`ReportRow`] per scanned file that reached the
//! resolver. KEEP rows are written as soon as resolution finishes; MOVE
//! rows are written one at a time as each archival attempt completes, so a
//! crash mid-run still leaves every finished move on record.

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::actions::{ArchiveOutcome, MoveStatus};
use crate::duplicates::{ResolutionDecision, Verdict};

/// Errors raised while writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error during JSON serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One line of the cleanup report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// Absolute source path
    pub source: String,
    /// Path relative to the scan root
    pub relative_path: String,
    /// Size in bytes at scan time
    pub size: u64,
    /// KEEP or MOVE
    pub decision: Verdict,
    /// Why the decision was made
    pub reason: String,
    /// The file this one is redundant against (MOVE only)
    pub conflict_source: Option<String>,
    /// Archive destination actually used or planned
    pub destination: Option<String>,
    /// MOVED, PLANNED or FAILED (MOVE only)
    pub status: Option<MoveStatus>,
    /// Cause of a failed move
    pub error: Option<String>,
    /// BLAKE3 hex digest, when the file was hashed
    pub content_hash: Option<String>,
}

impl ReportRow {
    /// Row for a decision, before any archival attempt.
    #[must_use]
    pub fn from_decision(decision: &ResolutionDecision) -> Self {
        Self {
            source: decision.entry.absolute_path.display().to_string(),
            relative_path: decision.entry.relative_path.display().to_string(),
            size: decision.entry.size,
            decision: decision.verdict,
            reason: decision.reason_text(),
            conflict_source: decision
                .conflict_source
                .as_ref()
                .map(|c| c.absolute_path.display().to_string()),
            destination: None,
            status: None,
            error: None,
            content_hash: decision.entry.hash_hex(),
        }
    }

    /// Attach the outcome of the archival attempt.
    #[must_use]
    pub fn with_outcome(mut self, outcome: &ArchiveOutcome) -> Self {
        self.destination = outcome
            .destination
            .as_ref()
            .map(|d| d.display().to_string());
        self.status = Some(outcome.status);
        self.error.clone_from(&outcome.error);
        self
    }
}

/// Append-only destination for report rows.
///
/// Implementations must make each recorded row durable (flushed) before
/// returning so partial progress survives an abrupt exit.
pub trait ReportSink: Send {
    /// Append one row.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if the row cannot be written.
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError>;

    /// Called once after the last row.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if trailing output cannot be written.
    fn finish(&mut self) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Keeps rows in memory. Used by library callers and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Rows in the order they were recorded
    pub rows: Vec<ReportRow>,
    /// Whether `finish` has been called
    pub finished: bool,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows with the given decision.
    pub fn rows_with(&self, decision: Verdict) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(move |r| r.decision == decision)
    }
}

impl ReportSink for MemorySink {
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.finished = true;
        Ok(())
    }
}
