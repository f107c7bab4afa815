//! Scanner module for directory traversal and file fingerprinting.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk
//! - Streaming content fingerprints with BLAKE3
//! - Unicode path normalization for cross-tree comparison
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Chunked BLAKE3 fingerprinting
//! - [`path_utils`]: NFC normalization and path helpers
//!
//! # Example
//!
//! ```no_run
//! use treeclean::scanner::{ScanConfig, Walker};
//! use std::path::Path;
//!
//! let config = ScanConfig::default().with_extension_filter(["pdf"]);
//! let outcome = Walker::new(Path::new("."), config).scan();
//! for entry in &outcome.entries {
//!     println!("{}: {} bytes", entry.relative_path.display(), entry.size);
//! }
//! ```

pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// Re-export main types
pub use hasher::{hash_to_hex, hex_to_hash, Hash, Hasher, CHUNK_SIZE};
pub use walker::{ScanOutcome, Walker};

/// Path segments ignored by default: VCS metadata, build caches, OS metadata files.
pub const DEFAULT_IGNORE_SEGMENTS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "__pycache__",
    "node_modules",
    "venv",
    ".idea",
    ".DS_Store",
    "Thumbs.db",
];

/// File name prefixes excluded by default (AppleDouble resource forks, Office lock files).
pub const DEFAULT_EXCLUDE_PREFIXES: &[&str] = &["._", "~$"];

/// One regular file discovered under a scan root.
///
/// Entries are immutable once scanned, except for the content hash which is
/// filled in lazily (at most once) when a later phase needs it. They are
/// shared across worker threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path relative to the scan root, used as the cross-tree identity key
    pub relative_path: PathBuf,
    /// Absolute path to the file
    pub absolute_path: PathBuf,
    /// File size in bytes at scan time
    pub size: u64,
    content_hash: OnceLock<Hash>,
}

impl FileEntry {
    /// Create a new FileEntry.
    ///
    /// # Arguments
    ///
    /// * `relative_path` - Path relative to the scan root
    /// * `absolute_path` - Absolute path to the file
    /// * `size` - File size in bytes
    #[must_use]
    pub fn new(relative_path: PathBuf, absolute_path: PathBuf, size: u64) -> Self {
        Self {
            relative_path,
            absolute_path,
            size,
            content_hash: OnceLock::new(),
        }
    }

    /// The content hash, if one has been computed.
    #[must_use]
    pub fn content_hash(&self) -> Option<&Hash> {
        self.content_hash.get()
    }

    /// Record the content hash. Returns `false` if a hash was already set.
    pub fn set_content_hash(&self, hash: Hash) -> bool {
        self.content_hash.set(hash).is_ok()
    }

    /// File name component of the absolute path.
    #[must_use]
    pub fn file_name(&self) -> Option<&OsStr> {
        self.absolute_path.file_name()
    }

    /// Content hash as a hexadecimal string, if it was computed.
    #[must_use]
    pub fn hash_hex(&self) -> Option<String> {
        self.content_hash().map(hash_to_hex)
    }
}

/// Configuration for tree scanning.
///
/// Controls which path segments, file names and extensions are considered.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Path segments (directory or file names) that exclude a path when matched exactly.
    pub ignore_segments: BTreeSet<String>,

    /// Lower-cased extensions (without the dot) to include. `None` means all regular files.
    pub extension_filter: Option<BTreeSet<String>>,

    /// File name prefixes that mark hidden or incomplete-transfer files.
    pub exclude_prefixes: Vec<String>,

    /// Absolute subtrees to skip entirely (e.g. an archive root inside the scan root).
    pub excluded_roots: Vec<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignore_segments: DEFAULT_IGNORE_SEGMENTS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            extension_filter: None,
            exclude_prefixes: DEFAULT_EXCLUDE_PREFIXES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            excluded_roots: Vec::new(),
        }
    }
}

impl ScanConfig {
    /// Replace the ignore set.
    #[must_use]
    pub fn with_ignore_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_segments = segments.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the scan to the given extensions (case-insensitive, leading dot optional).
    #[must_use]
    pub fn with_extension_filter<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        self.extension_filter = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// Replace the excluded file name prefixes.
    #[must_use]
    pub fn with_exclude_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Skip everything beneath `root`.
    #[must_use]
    pub fn with_excluded_root(mut self, root: PathBuf) -> Self {
        self.excluded_roots.push(root);
        self
    }

    /// Whether a single path segment is in the ignore set.
    #[must_use]
    pub fn is_ignored_segment(&self, segment: &OsStr) -> bool {
        segment
            .to_str()
            .is_some_and(|s| self.ignore_segments.contains(s))
    }

    /// Whether the file name carries an excluded marker prefix.
    #[must_use]
    pub fn has_excluded_prefix(&self, file_name: &OsStr) -> bool {
        let name = file_name.to_string_lossy();
        self.exclude_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
    }

    /// Whether the file passes the extension allow-list.
    #[must_use]
    pub fn passes_extension_filter(&self, path: &Path) -> bool {
        let Some(filter) = &self.extension_filter else {
            return true;
        };
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| filter.contains(&ext.to_lowercase()))
    }
}

/// Lower-case an extension and strip any leading dots.
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Errors that can occur during directory scanning.
///
/// These are never fatal: the offending entry is skipped and the scan continues.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path disappeared between listing and stat.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error for the given path.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Errors that can occur while fingerprinting a file (the IOFailure class).
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error for the given path.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
