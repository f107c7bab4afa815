//! Report sinks and output formatters.
//!
//! - [`report`]: the [`ReportSink`] trait and [`ReportRow`]
//! - [`csv`]: CSV cleanup reports (flushed per row) and CSV diffs
//! - [`json`]: JSON run summaries, JSON diffs and JSON Lines reports
//! - [`text`]: human-readable summaries and coloured diff listings

pub mod csv;
pub mod json;
pub mod report;
pub mod text;

pub use csv::{CsvReportSink, DiffCsvOutput};
pub use json::{JsonDiffOutput, JsonLinesSink, JsonRunOutput};
pub use report::{MemorySink, ReportError, ReportRow, ReportSink};
pub use text::{DiffTextOutput, RunTextOutput};
