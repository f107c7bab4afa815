//! Human-readable output.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::{Color, Paint};

use crate::diff::{DiffRecord, DiffReport, DiffStatus};
use crate::engine::RunSummary;

fn paint(text: &str, color: Color, enabled: bool) -> String {
    if enabled {
        text.fg(color).to_string()
    } else {
        text.to_string()
    }
}

/// Plain-text summary of a cleanup run.
#[derive(Debug)]
pub struct RunTextOutput<'a> {
    summary: &'a RunSummary,
    color: bool,
}

impl<'a> RunTextOutput<'a> {
    /// Create a formatter.
    #[must_use]
    pub fn new(summary: &'a RunSummary) -> Self {
        Self {
            summary,
            color: true,
        }
    }

    /// Enable or disable ANSI colours.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Write the summary.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let s = self.summary;
        writeln!(
            w,
            "Scanned {} files ({}) under {}",
            s.total_scanned,
            ByteSize::b(s.total_bytes),
            s.scan_root.display()
        )?;
        writeln!(
            w,
            "Flagged {} files ({}) using {} strategy, kept {}",
            s.flagged,
            ByteSize::b(s.bytes_flagged),
            s.strategy,
            s.kept
        )?;
        if s.potential_savings > s.bytes_flagged {
            writeln!(
                w,
                "Same-size candidates could have freed up to {}",
                ByteSize::b(s.potential_savings)
            )?;
        }

        if s.dry_run {
            writeln!(
                w,
                "{} would archive {} files ({}) to {}",
                paint("Dry run:", Color::Yellow, self.color),
                s.planned,
                ByteSize::b(s.bytes_reclaimed),
                s.archive_root.display()
            )?;
        } else {
            writeln!(
                w,
                "Archived {} files ({}) to {}",
                s.archived,
                ByteSize::b(s.bytes_reclaimed),
                s.archive_root.display()
            )?;
        }

        if s.failures() > 0 {
            writeln!(
                w,
                "{} {} scan, {} hash, {} archive",
                paint("Failures:", Color::Red, self.color),
                s.scan_errors,
                s.hash_failures,
                s.archive_failures
            )?;
        }
        if s.extraction_failures > 0 {
            writeln!(
                w,
                "Kept {} files with no recognizable name/version",
                s.extraction_failures
            )?;
        }
        if s.interrupted {
            writeln!(
                w,
                "{}",
                paint("Interrupted: remaining files were not archived", Color::Yellow, self.color)
            )?;
        }
        writeln!(w, "Completed in {} ms", s.duration_ms)
    }
}

/// Coloured listing of a tree diff.
#[derive(Debug)]
pub struct DiffTextOutput<'a> {
    report: &'a DiffReport,
    show_identical: bool,
    color: bool,
}

impl<'a> DiffTextOutput<'a> {
    /// Create a formatter. Identical paths are listed only with `show_identical`.
    #[must_use]
    pub fn new(report: &'a DiffReport, show_identical: bool) -> Self {
        Self {
            report,
            show_identical,
            color: true,
        }
    }

    /// Enable or disable ANSI colours.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn line(&self, record: &DiffRecord) -> String {
        let path = &record.relative_path;
        match record.status {
            DiffStatus::OnlyA => format!("{} {path}", paint("[ONLY A]", Color::Red, self.color)),
            DiffStatus::OnlyB => format!("{} {path}", paint("[ONLY B]", Color::Green, self.color)),
            DiffStatus::Differs => {
                let evidence = match record.size_delta {
                    Some(0) | None if record.hash_mismatch => "content differs".to_string(),
                    Some(d) => format!("{d:+} bytes"),
                    None => String::new(),
                };
                format!(
                    "{} {path} ({evidence})",
                    paint("[DIFFERS]", Color::Yellow, self.color)
                )
            }
            DiffStatus::Identical => {
                format!("{} {path}", paint("[SAME]", Color::Cyan, self.color))
            }
        }
    }

    /// Write the listing and a summary line.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for record in &self.report.records {
            if record.status == DiffStatus::Identical && !self.show_identical {
                continue;
            }
            writeln!(w, "{}", self.line(record))?;
        }

        let s = &self.report.summary;
        writeln!(w, "A: {} files, B: {} files", s.files_a, s.files_b)?;
        if s.is_clean() {
            writeln!(
                w,
                "{}",
                paint("Trees are identical", Color::Green, self.color)
            )?;
        } else {
            writeln!(
                w,
                "{} only in A, {} only in B, {} differ, {} identical",
                s.only_a, s.only_b, s.differs, s.identical
            )?;
        }
        if s.hash_failures > 0 || s.scan_errors > 0 {
            writeln!(
                w,
                "{} {} unreadable pairs, {} scan errors",
                paint("Warning:", Color::Red, self.color),
                s.hash_failures,
                s.scan_errors
            )?;
        }
        if s.key_collisions > 0 {
            writeln!(
                w,
                "{} {} paths share a Unicode-normalized name and are listed by raw name",
                paint("Warning:", Color::Yellow, self.color),
                s.key_collisions
            )?;
        }
        Ok(())
    }
}
