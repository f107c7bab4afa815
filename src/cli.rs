//! Command-line interface definitions.
//!
//! # Example
//!
//! ```bash
//! # Archive exact duplicates under ~/Downloads (archive on the desktop)
//! treeclean clean ~/Downloads
//!
//! # Keep only the newest version of each font, preview first
//! treeclean clean ~/Fonts --preset fonts --dry-run
//!
//! # Compare two project trees, hashing same-size files
//! treeclean diff ./release-1.0 ./release-1.1 --strict
//!
//! # Write a starter config file
//! treeclean init-config
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Preset;
use crate::duplicates::{ResolutionStrategy, VersionComparator};

/// Find duplicate files, archive the redundant ones, and diff directory trees.
///
/// Redundant files are never deleted: they are moved into an archive folder,
/// and every decision is written to a CSV report.
#[derive(Debug, Parser)]
#[command(name = "treeclean")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find redundant files and move them into an archive folder
    Clean(CleanArgs),
    /// Compare two directory trees path by path
    Diff(DiffArgs),
    /// Write the effective configuration to a TOML file
    InitConfig(InitConfigArgs),
}

/// Scanner options shared by both subcommands.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Only consider these extensions (repeatable or comma-separated)
    #[arg(short, long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Additional path segments to ignore (repeatable)
    #[arg(short, long = "ignore", value_name = "SEGMENT")]
    pub ignore: Vec<String>,

    /// Number of I/O threads (default: 4, or the configured value)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,
}

/// Arguments for the clean subcommand.
#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Directory to clean
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Archive folder (defaults to a timestamped folder on the desktop)
    #[arg(short, long, value_name = "DIR")]
    pub archive: Option<PathBuf>,

    /// Preset extensions and strategy for a kind of collection
    #[arg(short, long, value_enum)]
    pub preset: Option<Preset>,

    /// Resolution strategy (overrides the preset)
    #[arg(short, long, value_enum)]
    pub strategy: Option<ResolutionStrategy>,

    /// Version ordering for the version-aware strategy
    #[arg(long, value_enum)]
    pub comparator: Option<VersionComparator>,

    /// Regex with `name` and `version` groups, matched against file stems
    #[arg(long, value_name = "REGEX")]
    pub identity_pattern: Option<String>,

    /// Report decisions without moving anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Report file (defaults to the archive folder, or stdout for a dry run)
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value = "csv")]
    pub report_format: ReportFormat,

    /// Summary format printed after the run
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: SummaryFormat,

    /// Scanner options
    #[command(flatten)]
    pub scan: ScanArgs,
}

/// Arguments for the diff subcommand.
#[derive(Debug, Args)]
pub struct DiffArgs {
    /// First tree (A)
    #[arg(value_name = "A")]
    pub left: PathBuf,

    /// Second tree (B)
    #[arg(value_name = "B")]
    pub right: PathBuf,

    /// Hash same-size files to catch content changes
    #[arg(long)]
    pub strict: bool,

    /// Also list identical paths
    #[arg(long)]
    pub show_identical: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: DiffFormat,

    /// Scanner options
    #[command(flatten)]
    pub scan: ScanArgs,
}

/// Arguments for the init-config subcommand.
#[derive(Debug, Args)]
pub struct InitConfigArgs {
    /// Destination (defaults to --config, then the platform config file)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Summary format for `clean`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummaryFormat {
    /// Human-readable text
    Text,
    /// JSON for scripting
    Json,
}

/// Format of the per-file cleanup report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// One CSV row per file
    Csv,
    /// One JSON object per line
    Jsonl,
}

/// Output format for `diff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiffFormat {
    /// Coloured listing
    Text,
    /// CSV for spreadsheets
    Csv,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for DiffFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
        }
    }
}
