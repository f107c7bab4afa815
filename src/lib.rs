//! TreeClean - content-addressed duplicate detection and safe archival.
//!
//! Walks a tree, buckets files by size, hashes only same-size candidates
//! with BLAKE3, decides which copies are redundant (exact content, or an
//! older version of the same logical file), and moves those into an archive
//! folder with an auditable CSV report. A second mode compares two trees
//! path by path.

pub mod actions;
pub mod cli;
pub mod config;
pub mod diff;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod workers;

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{
    CleanArgs, Cli, Commands, DiffArgs, DiffFormat, InitConfigArgs, ReportFormat, ScanArgs,
    SummaryFormat,
};
use crate::config::{default_archive_root, validate_scan_root, Config, RunConfig};
use crate::diff::diff_trees;
use crate::duplicates::{FilenameIdentityExtractor, ResolutionStrategy};
use crate::engine::CleanupEngine;
use crate::error::ExitCode;
use crate::output::{
    CsvReportSink, DiffCsvOutput, DiffTextOutput, JsonDiffOutput, JsonLinesSink, JsonRunOutput,
    ReportSink, RunTextOutput,
};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::ScanConfig;

/// Run the application for parsed CLI arguments.
///
/// # Errors
///
/// Returns an error for invalid configuration, report failures, or an
/// interrupted run. `main` maps these to exit codes.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    if let Err(e) = logging::init_logging(cli.verbose, cli.quiet) {
        eprintln!("Logger already initialized: {e}");
    }
    if cli.no_color || !io::stdout().is_terminal() {
        yansi::disable();
    }

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Clean(args) => {
            let (shutdown, progress) = runtime(cli.quiet)?;
            run_clean(&config, args, shutdown, progress)
        }
        Commands::Diff(args) => {
            let (shutdown, progress) = runtime(cli.quiet)?;
            run_diff(&config, &args, shutdown, progress)
        }
        Commands::InitConfig(args) => run_init_config(&config, &args, cli.config),
    }
}

/// Ctrl+C flag and progress renderer for a scanning command.
fn runtime(quiet: bool) -> Result<(Arc<AtomicBool>, Arc<dyn ProgressCallback>)> {
    let shutdown = signal::install_handler().context("failed to install Ctrl+C handler")?;
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(quiet));
    Ok((shutdown.flag(), progress))
}

fn run_init_config(
    config: &Config,
    args: &InitConfigArgs,
    global_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let path = args
        .path
        .clone()
        .or(global_path)
        .or_else(Config::config_path)
        .context("no configuration directory available; pass a path")?;
    if path.exists() && !args.force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config.save(&path)?;
    println!("{}", path.display());
    Ok(ExitCode::Success)
}

fn run_clean(
    config: &Config,
    args: CleanArgs,
    shutdown: Arc<AtomicBool>,
    progress: Arc<dyn ProgressCallback>,
) -> Result<ExitCode> {
    let run = build_run_config(config, &args);
    log::debug!("Run configuration: {:?}", run);

    let mut engine = CleanupEngine::new(run.clone())
        .with_shutdown_flag(shutdown)
        .with_progress_callback(progress);
    if let Some(pattern) = &args.identity_pattern {
        let extractor = FilenameIdentityExtractor::with_pattern(pattern)
            .with_context(|| format!("invalid identity pattern '{pattern}'"))?;
        engine = engine.with_extractor(Arc::new(extractor));
    }

    // Validate before anything (including the report file) touches the disk.
    run.validate()?;

    let (mut sink, report_on_stdout) = open_report(config, &args, &run)?;
    let summary = engine.run(sink.as_mut())?;
    drop(sink);

    // Keep stdout parseable when it carries the report.
    let mut out: Box<dyn Write> = if report_on_stdout {
        Box::new(io::stderr().lock())
    } else {
        Box::new(io::stdout().lock())
    };
    match args.output {
        SummaryFormat::Text => RunTextOutput::new(&summary)
            .with_color(yansi::is_enabled())
            .write_to(&mut out)?,
        SummaryFormat::Json => {
            writeln!(out, "{}", JsonRunOutput::new(&summary).to_json_pretty()?)?;
        }
    }
    Ok(summary.exit_code())
}

/// Merge persisted settings with the `clean` flags.
#[must_use]
pub fn build_run_config(config: &Config, args: &CleanArgs) -> RunConfig {
    let archive = args
        .archive
        .clone()
        .unwrap_or_else(|| default_archive_root(&config.archive_prefix, &args.path));

    let mut run = RunConfig::from_config(config, &args.path, archive)
        .with_extra_ignores(args.scan.ignore.iter().cloned())
        .with_dry_run(args.dry_run);
    if let Some(preset) = args.preset {
        run = run.with_preset(preset);
    }
    if !args.scan.extensions.is_empty() {
        run = run.with_extension_filter(&args.scan.extensions);
    }
    if let Some(strategy) = args.strategy {
        run = run.with_strategy(strategy);
    }
    if let Some(comparator) = args.comparator {
        run = run.with_comparator(comparator);
    }
    if let Some(threads) = args.scan.io_threads {
        run = run.with_io_threads(threads);
    }
    if run.resolution_strategy == ResolutionStrategy::VersionAware && run.extension_filter.is_none()
    {
        log::warn!("Version-aware resolution without an extension filter considers every file");
    }
    run
}

fn open_report(
    config: &Config,
    args: &CleanArgs,
    run: &RunConfig,
) -> Result<(Box<dyn ReportSink>, bool)> {
    let path: Option<PathBuf> = match (&args.report, run.dry_run) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => None,
        (None, false) => {
            let name = Path::new(&config.report_file_name);
            Some(run.archive_root.join(match args.report_format {
                ReportFormat::Csv => name.to_path_buf(),
                ReportFormat::Jsonl => name.with_extension("jsonl"),
            }))
        }
    };

    let Some(path) = path else {
        let sink: Box<dyn ReportSink> = match args.report_format {
            ReportFormat::Csv => Box::new(CsvReportSink::new(io::stdout())),
            ReportFormat::Jsonl => Box::new(JsonLinesSink::stdout()),
        };
        return Ok((sink, true));
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let sink: Box<dyn ReportSink> = match args.report_format {
        ReportFormat::Csv => Box::new(
            CsvReportSink::create(&path)
                .with_context(|| format!("cannot create report {}", path.display()))?,
        ),
        ReportFormat::Jsonl => Box::new(
            JsonLinesSink::create(&path)
                .with_context(|| format!("cannot create report {}", path.display()))?,
        ),
    };
    log::info!("Report: {}", path.display());
    Ok((sink, false))
}

fn scan_config(config: &Config, scan: &ScanArgs) -> ScanConfig {
    let mut scan_config = ScanConfig::default()
        .with_ignore_segments(
            config
                .ignore_segments
                .iter()
                .chain(scan.ignore.iter())
                .cloned(),
        )
        .with_exclude_prefixes(config.exclude_prefixes.iter().cloned());
    if !scan.extensions.is_empty() {
        scan_config = scan_config.with_extension_filter(&scan.extensions);
    }
    scan_config
}

fn run_diff(
    config: &Config,
    args: &DiffArgs,
    shutdown: Arc<AtomicBool>,
    progress: Arc<dyn ProgressCallback>,
) -> Result<ExitCode> {
    validate_scan_root(&args.left)?;
    validate_scan_root(&args.right)?;

    let diff_config = config
        .diff_config(args.strict, args.scan.io_threads)
        .with_shutdown_flag(shutdown)
        .with_progress_callback(progress);
    let report = diff_trees(
        &args.left,
        &args.right,
        &scan_config(config, &args.scan),
        diff_config,
    )?;
    let code = report.summary.exit_code();

    let mut stdout = io::stdout().lock();
    match args.output {
        DiffFormat::Text => DiffTextOutput::new(&report, args.show_identical)
            .with_color(yansi::is_enabled())
            .write_to(&mut stdout)?,
        DiffFormat::Csv => DiffCsvOutput::new(&report, args.show_identical).write_to(&mut stdout)?,
        DiffFormat::Json => {
            JsonDiffOutput::new(&report, args.show_identical, code).write_to(&mut stdout)?;
        }
    }
    Ok(code)
}
