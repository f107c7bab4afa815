//! Size bucketing.
//!
//! # Overview
//!
//! Files with different sizes cannot have identical content, so grouping by
//! exact byte length is the cheap first filter before any file is read. A
//! bucket with a single member is dropped: that file is unique and is never
//! hashed. Zero-byte files are set aside entirely; an empty file is not a
//! meaningful duplicate worth archiving.
//!
//! Buckets come back in order of their first member's scan position, and
//! members inside a bucket keep scan order. Each member also records its
//! position in the original scan so results computed in parallel can be
//! re-joined against that fixed order.
//!
//! # Example
//!
//! ```
//! use treeclean::scanner::FileEntry;
//! use treeclean::duplicates::bucket_by_size;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let entry = |name: &str, size| {
//!     Arc::new(FileEntry::new(PathBuf::from(name), PathBuf::from(format!("/t/{name}")), size))
//! };
//! let files = vec![entry("a.txt", 10), entry("b.txt", 10), entry("c.txt", 20)];
//!
//! let (buckets, stats) = bucket_by_size(&files);
//! assert_eq!(buckets.len(), 1);
//! assert_eq!(buckets[0].positions, vec![0, 1]);
//! assert_eq!(stats.eliminated_unique, 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::scanner::FileEntry;

/// Files sharing one exact byte size.
#[derive(Debug, Clone)]
pub struct SizeBucket {
    /// Size shared by every member
    pub size: u64,
    /// Members in scan order
    pub entries: Vec<Arc<FileEntry>>,
    /// Scan-order index of each member, parallel to `entries`
    pub positions: Vec<usize>,
}

impl SizeBucket {
    fn new(size: u64) -> Self {
        Self {
            size,
            entries: Vec::new(),
            positions: Vec::new(),
        }
    }

    fn push(&mut self, position: usize, entry: Arc<FileEntry>) {
        debug_assert_eq!(entry.size, self.size);
        self.positions.push(position);
        self.entries.push(entry);
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bucket has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Members paired with their scan position.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Arc<FileEntry>)> {
        self.positions.iter().copied().zip(self.entries.iter())
    }

    /// Upper bound on reclaimable bytes: all members but one.
    #[must_use]
    pub fn potential_savings(&self) -> u64 {
        self.size * (self.entries.len() as u64).saturating_sub(1)
    }
}

/// Statistics about a bucketing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    /// Total number of files considered
    pub total_files: usize,
    /// Total size of all files in bytes
    pub total_size: u64,
    /// Number of distinct non-zero sizes
    pub unique_sizes: usize,
    /// Files in buckets of two or more
    pub potential_duplicates: usize,
    /// Files dropped because their size is unique
    pub eliminated_unique: usize,
    /// Zero-byte files set aside
    pub empty_files: usize,
    /// Buckets with two or more members
    pub duplicate_groups: usize,
    /// Upper bound on reclaimable bytes across those buckets
    pub potential_savings: u64,
}

impl GroupingStats {
    /// Percentage of files eliminated by size alone.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Group entries by size, returning only multi-member buckets.
///
/// No file I/O is performed.
#[must_use]
pub fn bucket_by_size(entries: &[Arc<FileEntry>]) -> (Vec<SizeBucket>, GroupingStats) {
    let mut stats = GroupingStats::default();
    let mut slot_by_size: HashMap<u64, usize> = HashMap::new();
    let mut all: Vec<SizeBucket> = Vec::new();

    for (position, entry) in entries.iter().enumerate() {
        stats.total_files += 1;
        stats.total_size += entry.size;

        if entry.size == 0 {
            stats.empty_files += 1;
            log::trace!("Empty file set aside: {}", entry.relative_path.display());
            continue;
        }

        let slot = *slot_by_size.entry(entry.size).or_insert_with(|| {
            all.push(SizeBucket::new(entry.size));
            all.len() - 1
        });
        all[slot].push(position, Arc::clone(entry));
    }

    stats.unique_sizes = all.len();

    let buckets: Vec<SizeBucket> = all
        .into_iter()
        .filter(|bucket| {
            if bucket.len() == 1 {
                stats.eliminated_unique += 1;
                false
            } else {
                stats.potential_duplicates += bucket.len();
                stats.duplicate_groups += 1;
                stats.potential_savings += bucket.potential_savings();
                true
            }
        })
        .collect();

    if stats.empty_files > 0 {
        log::debug!("Set aside {} empty file(s)", stats.empty_files);
    }
    log::info!(
        "Size bucketing: {} files, {} candidate bucket(s), {:.1}% eliminated, at most {} bytes reclaimable",
        stats.total_files,
        stats.duplicate_groups,
        stats.elimination_rate(),
        stats.potential_savings
    );

    (buckets, stats)
}

/// The complete size index, including singletons and zero-byte files.
///
/// Useful for reporting; the resolver only consumes [`bucket_by_size`].
#[must_use]
pub fn full_size_index(entries: &[Arc<FileEntry>]) -> BTreeMap<u64, Vec<Arc<FileEntry>>> {
    let mut index: BTreeMap<u64, Vec<Arc<FileEntry>>> = BTreeMap::new();
    for entry in entries {
        index.entry(entry.size).or_default().push(Arc::clone(entry));
    }
    index
}
