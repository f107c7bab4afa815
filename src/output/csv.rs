//! CSV writers for cleanup reports and tree diffs.
//!
//! # Cleanup report columns
//!
//! - `source`: absolute path of the scanned file
//! - `relative_path`: path relative to the scan root
//! - `size`: size in bytes at scan time
//! - `decision`: `KEEP` or `MOVE`
//! - `reason`: human-readable justification
//! - `conflict_source`: the file a MOVE is redundant against
//! - `destination`: archive path used or planned
//! - `status`: `MOVED`, `PLANNED` or `FAILED`
//! - `error`: cause of a failed move
//!
//! # Diff columns
//!
//! `relative_path,status,size_a,size_b,size_delta,hash_mismatch`

use std::fs::File;
use std::io;
use std::path::Path;

use serde::Serialize;

use super::report::{ReportError, ReportRow, ReportSink};
use crate::diff::{DiffReport, DiffStatus};

/// Streams report rows as CSV, flushing after every row.
pub struct CsvReportSink<W: io::Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvReportSink<File> {
    /// Create (or truncate) a report file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, ReportError> {
        let file = File::create(path)?;
        log::debug!("Writing report to {}", path.display());
        Ok(Self::new(file))
    }
}

impl<W: io::Write> CsvReportSink<W> {
    /// Wrap a writer. The header is written with the first row.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            rows: 0,
        }
    }

    /// Rows written so far.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Recover the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if buffered data cannot be flushed.
    pub fn into_inner(self) -> Result<W, ReportError> {
        self.writer
            .into_inner()
            .map_err(|e| ReportError::Io(e.into_error()))
    }
}

impl<W: io::Write + Send> ReportSink for CsvReportSink<W> {
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct DiffCsvRow<'a> {
    relative_path: &'a str,
    status: DiffStatus,
    size_a: Option<u64>,
    size_b: Option<u64>,
    size_delta: Option<i64>,
    hash_mismatch: bool,
}

/// CSV formatter for a [`DiffReport`].
pub struct DiffCsvOutput<'a> {
    report: &'a DiffReport,
    show_identical: bool,
}

impl<'a> DiffCsvOutput<'a> {
    /// Create a formatter. Identical paths are omitted unless `show_identical`.
    #[must_use]
    pub fn new(report: &'a DiffReport, show_identical: bool) -> Self {
        Self {
            report,
            show_identical,
        }
    }

    /// Write the CSV to `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), ReportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let records = self
            .report
            .records
            .iter()
            .filter(|r| self.show_identical || r.status != DiffStatus::Identical);

        for record in records {
            csv_writer.serialize(DiffCsvRow {
                relative_path: &record.relative_path,
                status: record.status,
                size_a: record.size_a,
                size_b: record.size_b,
                size_delta: record.size_delta,
                hash_mismatch: record.hash_mismatch,
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Render the CSV as a string.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if serialization fails.
    pub fn to_string(&self) -> Result<String, ReportError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
