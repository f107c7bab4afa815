//! Configuration management.
//!
//! Two layers live here:
//!
//! - [`Config`]: persisted knobs, merged with `figment` from built-in
//!   defaults, a TOML file (platform config dir or `--config`), and
//!   `TREECLEAN_*` environment variables. CLI flags are applied on top by
//!   the caller.
//! - [`RunConfig`]: the validated settings for one cleanup run.
//!   [`RunConfig::validate`] is the only place a [`ConfigError`] is raised,
//!   and it runs before any scanning starts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use directories::{ProjectDirs, UserDirs};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diff::DiffConfig;
use crate::duplicates::{ResolutionStrategy, VersionComparator};
use crate::scanner::path_utils::{absolutize, is_within};
use crate::scanner::{ScanConfig, DEFAULT_EXCLUDE_PREFIXES, DEFAULT_IGNORE_SEGMENTS};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "TREECLEAN_";

/// Fatal configuration problems, detected before any work begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The scan root does not exist.
    #[error("scan root does not exist: {0}")]
    ScanRootMissing(PathBuf),

    /// The scan root is not a directory.
    #[error("scan root is not a directory: {0}")]
    ScanRootNotDirectory(PathBuf),

    /// The archive root exists but is not a directory.
    #[error("archive root exists and is not a directory: {0}")]
    ArchiveRootNotDirectory(PathBuf),

    /// The scan root is the archive root or lies inside it.
    #[error("scan root {scan} lies inside archive root {archive}")]
    ScanRootInsideArchive {
        /// Scan root
        scan: PathBuf,
        /// Archive root
        archive: PathBuf,
    },

    /// Worker thread count must be at least 1.
    #[error("invalid I/O thread count: {0}")]
    InvalidThreads(usize),

    /// A path could not be made absolute.
    #[error("cannot resolve {path}: {source}")]
    Resolve {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The layered configuration could not be loaded.
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// The configuration could not be written.
    #[error("cannot write configuration to {path}: {reason}")]
    Save {
        /// Destination file
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },
}

/// Built-in presets for common collections.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Font files, version-aware resolution
    Fonts,
    /// PDF documents, exact-content resolution
    Pdf,
    /// Every regular file, exact-content resolution
    All,
}

impl Preset {
    /// Extension allow-list, or `None` for all files.
    #[must_use]
    pub fn extensions(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Fonts => Some(&["ttf", "otf", "ttc", "dfont"]),
            Self::Pdf => Some(&["pdf"]),
            Self::All => None,
        }
    }

    /// Resolution strategy for the preset.
    #[must_use]
    pub fn strategy(self) -> ResolutionStrategy {
        match self {
            Self::Fonts => ResolutionStrategy::VersionAware,
            Self::Pdf | Self::All => ResolutionStrategy::Exact,
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fonts => write!(f, "fonts"),
            Self::Pdf => write!(f, "pdf"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Persisted application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path segments that exclude a path when matched exactly
    pub ignore_segments: Vec<String>,
    /// File-name prefixes of marker files to skip
    pub exclude_prefixes: Vec<String>,
    /// Worker threads for hashing, extraction and moves
    pub io_threads: usize,
    /// Version ordering for version-aware resolution
    pub version_comparator: VersionComparator,
    /// Report file name inside the archive root
    pub report_file_name: String,
    /// Prefix of the default timestamped archive folder
    pub archive_prefix: String,
    /// Hash equal-size pairs when diffing, as if `--strict` were given
    pub diff_strict_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_segments: DEFAULT_IGNORE_SEGMENTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            exclude_prefixes: DEFAULT_EXCLUDE_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            io_threads: 4,
            version_comparator: VersionComparator::default(),
            report_file_name: "cleanup_report.csv".to_string(),
            archive_prefix: "Cleanup_Archive".to_string(),
            diff_strict_mode: false,
        }
    }
}

impl Config {
    /// Build the layered figment: defaults < TOML file < environment.
    ///
    /// `path` overrides the platform config file.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(p) => figment = figment.merge(Toml::file(p)),
            None => {
                if let Some(p) = Self::config_path() {
                    figment = figment.merge(Toml::file(p));
                }
            }
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Figment`] if the file or environment contain
    /// invalid values. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Config = Self::figment(path).extract()?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Write this configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Save`] if serialization or any write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let save_error = |reason: String| ConfigError::Save {
            path: path.to_path_buf(),
            reason,
        };
        let body = toml::to_string_pretty(self).map_err(|e| save_error(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
        }
        std::fs::write(path, body).map_err(|e| save_error(e.to_string()))?;
        log::info!("Wrote configuration to {}", path.display());
        Ok(())
    }

    /// Differ settings: strict when either the caller or the persisted
    /// `diff_strict_mode` asks for it.
    #[must_use]
    pub fn diff_config(&self, strict: bool, io_threads: Option<usize>) -> DiffConfig {
        DiffConfig::default()
            .with_strict(strict || self.diff_strict_mode)
            .with_io_threads(io_threads.unwrap_or(self.io_threads))
    }

    /// Platform-specific configuration file path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "treeclean", "treeclean")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Timestamped archive folder name, e.g. `Cleanup_Archive_20240131_0915`.
#[must_use]
pub fn archive_folder_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{prefix}_{}", now.format("%Y%m%d_%H%M"))
}

/// Default archive root: a timestamped folder on the desktop, falling back
/// to the home directory and then to the scan root's parent.
#[must_use]
pub fn default_archive_root(prefix: &str, scan_root: &Path) -> PathBuf {
    let name = archive_folder_name(prefix, Local::now());
    let base = UserDirs::new()
        .and_then(|dirs| {
            dirs.desktop_dir()
                .map(Path::to_path_buf)
                .or_else(|| Some(dirs.home_dir().to_path_buf()))
        })
        .or_else(|| scan_root.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| scan_root.to_path_buf());
    base.join(name)
}

/// Check that `path` exists and is a directory.
///
/// # Errors
///
/// [`ConfigError::ScanRootMissing`] or [`ConfigError::ScanRootNotDirectory`].
pub fn validate_scan_root(path: &Path) -> Result<(), ConfigError> {
    match std::fs::metadata(path) {
        Err(_) => Err(ConfigError::ScanRootMissing(path.to_path_buf())),
        Ok(m) if !m.is_dir() => Err(ConfigError::ScanRootNotDirectory(path.to_path_buf())),
        Ok(_) => Ok(()),
    }
}

/// Settings for one cleanup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Tree to scan
    pub scan_root: PathBuf,
    /// Quarantine directory for redundant files
    pub archive_root: PathBuf,
    /// Segments that exclude a path
    pub ignore_segments: BTreeSet<String>,
    /// Marker-file prefixes to skip
    pub exclude_prefixes: Vec<String>,
    /// Lower-cased extension allow-list
    pub extension_filter: Option<BTreeSet<String>>,
    /// Exact or version-aware
    pub resolution_strategy: ResolutionStrategy,
    /// Version ordering for version-aware runs
    pub comparator: VersionComparator,
    /// Compute and report decisions without touching the filesystem
    pub dry_run: bool,
    /// Worker threads
    pub io_threads: usize,
}

impl RunConfig {
    /// Run configuration with defaults for everything but the two roots.
    #[must_use]
    pub fn new(scan_root: impl Into<PathBuf>, archive_root: impl Into<PathBuf>) -> Self {
        Self::from_config(&Config::default(), scan_root, archive_root)
    }

    /// Run configuration seeded from persisted settings.
    #[must_use]
    pub fn from_config(
        config: &Config,
        scan_root: impl Into<PathBuf>,
        archive_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            scan_root: scan_root.into(),
            archive_root: archive_root.into(),
            ignore_segments: config.ignore_segments.iter().cloned().collect(),
            exclude_prefixes: config.exclude_prefixes.clone(),
            extension_filter: None,
            resolution_strategy: ResolutionStrategy::default(),
            comparator: config.version_comparator,
            dry_run: false,
            io_threads: config.io_threads,
        }
    }

    /// Apply a preset's extensions and strategy.
    #[must_use]
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.extension_filter = preset
            .extensions()
            .map(|exts| exts.iter().map(ToString::to_string).collect());
        self.resolution_strategy = preset.strategy();
        self
    }

    /// Restrict the scan to these extensions (case-insensitive, dot optional).
    #[must_use]
    pub fn with_extension_filter<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = extensions
            .into_iter()
            .map(|e| crate::scanner::normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        self.extension_filter = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// Add extra ignore segments.
    #[must_use]
    pub fn with_extra_ignores<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_segments
            .extend(segments.into_iter().map(Into::into));
        self
    }

    /// Set the resolution strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.resolution_strategy = strategy;
        self
    }

    /// Set the version comparator.
    #[must_use]
    pub fn with_comparator(mut self, comparator: VersionComparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Enable or disable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the worker thread count.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads;
        self
    }

    /// Check the roots and thread count.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_threads == 0 {
            return Err(ConfigError::InvalidThreads(self.io_threads));
        }
        validate_scan_root(&self.scan_root)?;

        if let Ok(m) = std::fs::metadata(&self.archive_root) {
            if !m.is_dir() {
                return Err(ConfigError::ArchiveRootNotDirectory(
                    self.archive_root.clone(),
                ));
            }
        }

        let scan = resolve(&self.scan_root)?;
        let archive = resolve(&self.archive_root)?;
        if is_within(&scan, &archive) {
            return Err(ConfigError::ScanRootInsideArchive { scan, archive });
        }
        Ok(())
    }

    /// Scanner settings, with the archive root excluded from the walk.
    #[must_use]
    pub fn scan_config(&self) -> ScanConfig {
        let mut config = ScanConfig::default()
            .with_ignore_segments(self.ignore_segments.iter().cloned())
            .with_exclude_prefixes(self.exclude_prefixes.iter().cloned())
            .with_excluded_root(self.archive_root.clone());
        if let Some(exts) = &self.extension_filter {
            config = config.with_extension_filter(exts.iter().cloned());
        }
        config
    }
}

fn resolve(path: &Path) -> Result<PathBuf, ConfigError> {
    absolutize(path).map_err(|source| ConfigError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}
