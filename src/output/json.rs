//! JSON output for run summaries, tree diffs and streamed report rows.
//!
//! # Run summary schema
//!
//! ```json
//! {
//!   "summary": {
//!     "scan_root": "/fonts",
//!     "archive_root": "/home/me/Desktop/Cleanup_Archive_20240131_0915",
//!     "strategy": "version-aware",
//!     "total_scanned": 120,
//!     "flagged": 7,
//!     "archived": 7,
//!     "archive_failures": 0,
//!     "bytes_reclaimed": 1048576,
//!     "...": "..."
//!   },
//!   "exit_code": 0,
//!   "exit_code_name": "TC000"
//! }
//! ```
//!
//! Diff output has the same envelope with `records` and a diff `summary`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use super::report::{ReportError, ReportRow, ReportSink};
use crate::diff::{DiffRecord, DiffReport, DiffStatus, DiffSummary};
use crate::engine::RunSummary;
use crate::error::ExitCode;

/// JSON envelope for a cleanup run.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRunOutput<'a> {
    /// Run totals
    pub summary: &'a RunSummary,
    /// Numeric exit code
    pub exit_code: i32,
    /// Machine-readable exit code name (e.g. "TC000")
    pub exit_code_name: &'static str,
}

impl<'a> JsonRunOutput<'a> {
    /// Wrap a run summary.
    #[must_use]
    pub fn new(summary: &'a RunSummary) -> Self {
        let code = summary.exit_code();
        Self {
            summary,
            exit_code: code.as_i32(),
            exit_code_name: code.code_prefix(),
        }
    }

    /// Serialize to a pretty-printed string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// JSON envelope for a tree diff.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDiffOutput<'a> {
    /// Records, identical ones omitted unless requested
    pub records: Vec<&'a DiffRecord>,
    /// Counts over all records
    pub summary: &'a DiffSummary,
    /// Numeric exit code
    pub exit_code: i32,
    /// Machine-readable exit code name
    pub exit_code_name: &'static str,
}

impl<'a> JsonDiffOutput<'a> {
    /// Wrap a diff report.
    #[must_use]
    pub fn new(report: &'a DiffReport, show_identical: bool, exit_code: ExitCode) -> Self {
        Self {
            records: report
                .records
                .iter()
                .filter(|r| show_identical || r.status != DiffStatus::Identical)
                .collect(),
            summary: &report.summary,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
        }
    }

    /// Write pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Streams report rows as JSON Lines, one object per line, flushed per row.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wrap a writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ReportSink for JsonLinesSink<W> {
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        serde_json::to_writer(&mut self.writer, row)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.writer.flush().map_err(ReportError::from)
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create (or truncate) a report file.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, ReportError> {
        let file = File::create(path)?;
        log::debug!("Writing report to {}", path.display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl JsonLinesSink<io::Stdout> {
    /// Sink writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}
