//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! This module provides the [`Hasher`] struct for computing content
//! fingerprints. Files are read in fixed-size chunks and folded into a
//! streaming digest, so memory use is bounded by the chunk size no matter
//! how large the file is.
//!
//! The digest only needs to detect accidental duplication, not resist
//! adversarial collisions.
//!
//! # Example
//!
//! ```no_run
//! use treeclean::scanner::{hash_to_hex, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let hash = hasher.fingerprint(Path::new("some/file.bin")).unwrap();
//! println!("{}", hash_to_hex(&hash));
//! ```

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{FileEntry, HashError};

/// A 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Default read size: 64 KiB amortizes syscall overhead on large files.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Streaming file hasher.
///
/// Thread-safe: a single instance is shared by all hashing workers. It keeps
/// a running count of fingerprints computed so callers can verify that
/// size-bucket pruning skipped the files it should have.
#[derive(Debug)]
pub struct Hasher {
    chunk_size: usize,
    computed: AtomicUsize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default 64 KiB chunk size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            computed: AtomicUsize::new(0),
        }
    }

    /// Override the read chunk size (minimum 1 byte).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Configured chunk size in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of fingerprints attempted by this hasher so far.
    #[must_use]
    pub fn hashes_computed(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    /// Compute the fingerprint of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or a read fails
    /// part-way through (permission, disappearance, device error).
    pub fn fingerprint(&self, path: &Path) -> Result<Hash, HashError> {
        self.computed.fetch_add(1, Ordering::Relaxed);

        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    hasher.update(&buffer[..n]);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            }
        }

        log::trace!("Fingerprinted {}", path.display());
        Ok(*hasher.finalize().as_bytes())
    }

    /// Fingerprint a scanned entry, reusing a previously computed hash.
    ///
    /// The result is stored on the entry so later phases never re-read the file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the file cannot be read.
    pub fn fingerprint_entry(&self, entry: &FileEntry) -> Result<Hash, HashError> {
        if let Some(hash) = entry.content_hash() {
            return Ok(*hash);
        }
        let hash = self.fingerprint(&entry.absolute_path)?;
        entry.set_content_hash(hash);
        Ok(hash)
    }
}

/// Convert a hash to its lowercase hexadecimal representation.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    use std::fmt::Write;
    hash.iter().fold(String::with_capacity(64), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

/// Parse a 64-character hexadecimal string back into a hash.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    if hex.len() != 64 || !hex.is_ascii() {
        return None;
    }
    let mut hash = [0u8; 32];
    for (i, byte) in hash.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(hash)
}
