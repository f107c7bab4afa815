//! Logical identities and version ordering for version-aware resolution.
//!
//! A [`LogicalIdentity`] names "the same thing at different revisions": two
//! font files with the same family name but different version strings, for
//! example. Identities come from an [`IdentityExtractor`]; the resolver never
//! parses file formats itself. An extractor that cannot make a safe claim
//! returns [`ExtractionFailure`], and the file is kept.
//!
//! Version tokens are ordered by a [`VersionComparator`]. The default,
//! [`VersionComparator::Structured`], compares dotted numeric segments as
//! numbers so that `10.0` sorts above `2.0`. Plain string ordering is
//! available as [`VersionComparator::Lexical`] when that is what a
//! collection's version strings were written for.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A (name, version) pair extracted from a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LogicalIdentity {
    /// Logical name (e.g. a font's full name)
    pub name: String,
    /// Version token, compared with a [`VersionComparator`]
    pub version: String,
}

impl LogicalIdentity {
    /// Create an identity.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for LogicalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Metadata for a file was unavailable. Such files are never archived.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// The file carries no recognizable name/version.
    #[error("no logical identity in {0}")]
    NoIdentity(PathBuf),

    /// The file name is not valid UTF-8.
    #[error("file name is not valid UTF-8: {0}")]
    InvalidName(PathBuf),

    /// The extractor could not read the file.
    #[error("cannot read metadata from {path}: {reason}")]
    Unreadable {
        /// File that failed
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },
}

/// Source of logical identities.
///
/// Implementations are called from worker threads, one file per call.
pub trait IdentityExtractor: Send + Sync {
    /// Extract the identity of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionFailure`] when no safe identity can be derived.
    fn extract_identity(&self, path: &Path) -> Result<LogicalIdentity, ExtractionFailure>;
}

/// Derives identities from file stems such as `Inter-v3.19.ttf`,
/// `Roboto_2.137.otf` or `Report v2.pdf`.
///
/// The stem must end in a separator (`-`, `_` or space), an optional `v`,
/// and a version that starts with a digit. Everything before the separator
/// is the name.
#[derive(Debug, Clone)]
pub struct FilenameIdentityExtractor {
    pattern: Regex,
}

impl FilenameIdentityExtractor {
    /// Default stem pattern with `name` and `version` capture groups.
    pub const DEFAULT_PATTERN: &'static str =
        r"^(?P<name>.+?)[-_ ][vV]?(?P<version>\d+(?:[._-][0-9A-Za-z]+)*)$";

    /// Create an extractor with the default pattern.
    ///
    /// # Errors
    ///
    /// Only fails if the regex engine rejects the built-in pattern.
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_pattern(Self::DEFAULT_PATTERN)
    }

    /// Create an extractor with a custom pattern.
    ///
    /// The pattern must define `name` and `version` capture groups.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error for an invalid pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl IdentityExtractor for FilenameIdentityExtractor {
    fn extract_identity(&self, path: &Path) -> Result<LogicalIdentity, ExtractionFailure> {
        let stem = path
            .file_stem()
            .ok_or_else(|| ExtractionFailure::NoIdentity(path.to_path_buf()))?
            .to_str()
            .ok_or_else(|| ExtractionFailure::InvalidName(path.to_path_buf()))?;

        let caps = self
            .pattern
            .captures(stem)
            .ok_or_else(|| ExtractionFailure::NoIdentity(path.to_path_buf()))?;

        match (caps.name("name"), caps.name("version")) {
            (Some(name), Some(version)) if !name.as_str().trim().is_empty() => Ok(
                LogicalIdentity::new(name.as_str().trim(), version.as_str()),
            ),
            _ => Err(ExtractionFailure::NoIdentity(path.to_path_buf())),
        }
    }
}

/// Ordering applied to version tokens.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VersionComparator {
    /// Segment-wise: split on `.`, `-`, `_` and spaces, numeric segments
    /// compared as numbers, others as strings.
    #[default]
    Structured,
    /// Plain string ordering (`"2.0" > "10.0"`).
    Lexical,
}

impl VersionComparator {
    /// Compare two version tokens.
    #[must_use]
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            Self::Lexical => a.cmp(b),
            Self::Structured => compare_structured(a, b),
        }
    }

    /// `true` when `candidate` is strictly newer than `current`.
    #[must_use]
    pub fn is_newer(self, candidate: &str, current: &str) -> bool {
        self.compare(candidate, current) == Ordering::Greater
    }
}

impl fmt::Display for VersionComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured => write!(f, "structured"),
            Self::Lexical => write!(f, "lexical"),
        }
    }
}

fn segments(version: &str) -> Vec<&str> {
    version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split(['.', '-', '_', ' '])
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_numeric(segment: &str) -> bool {
    segment.bytes().all(|b| b.is_ascii_digit())
}

/// Compare digit strings of any length without overflow.
fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

// Missing segments count as "0" against a number and as smaller than text;
// a number outranks text in the same position.
fn compare_structured(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);

    for i in 0..left.len().max(right.len()) {
        let ord = match (left.get(i), right.get(i)) {
            (Some(x), Some(y)) => match (is_numeric(x), is_numeric(y)) {
                (true, true) => compare_numeric(x, y),
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => x.cmp(y),
            },
            (Some(x), None) if is_numeric(x) => compare_numeric(x, "0"),
            (Some(_), None) => Ordering::Greater,
            (None, Some(y)) if is_numeric(y) => compare_numeric("0", y),
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
