//! Path normalization helpers.
//!
//! macOS stores file names decomposed (NFD) while Linux and Windows usually
//! keep them composed (NFC). The same visible name can therefore have two
//! byte representations, which would make a tree diff report a file as
//! present only on one side. Relative paths are folded to NFC with forward
//! slashes before they are used as cross-tree keys.
//!
//! ```
//! use treeclean::scanner::path_utils::normalize_path_str;
//!
//! assert_eq!(normalize_path_str("cafe\u{0301}.txt"), "café.txt");
//! ```

use std::path::{Component, Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

/// Normalize a string to NFC.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Cross-tree key for a root-relative path: NFC, `/`-separated.
///
/// Non-UTF-8 segments are converted lossily; such names cannot be NFC-folded
/// anyway.
#[must_use]
pub fn relative_key(relative: &Path) -> String {
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(normalize_path_str(&s.to_string_lossy())),
            _ => None,
        })
        .collect();
    segments.join("/")
}

/// Make `path` absolute without requiring it to exist.
///
/// The longest existing ancestor is canonicalized (resolving symlinks such
/// as `/tmp` on macOS) and the remaining components are appended verbatim.
/// This lets an archive root that has not been created yet be compared with
/// a canonical scan root.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for segment in tail.iter().rev() {
                out.push(segment);
            }
            return Ok(out);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
}

/// Whether `path` equals `ancestor` or lies beneath it (component-wise).
#[must_use]
pub fn is_within(path: &Path, ancestor: &Path) -> bool {
    path.starts_with(ancestor)
}
