//! Duplicate detection and resolution.
//!
//! - [`groups`]: size bucketing, the cheap first filter
//! - [`identity`]: logical identities and version ordering
//! - [`resolver`]: KEEP/MOVE decisions under the exact or version-aware strategy

pub mod groups;
pub mod identity;
pub mod resolver;

pub use groups::{bucket_by_size, full_size_index, GroupingStats, SizeBucket};
pub use identity::{
    ExtractionFailure, FilenameIdentityExtractor, IdentityExtractor, LogicalIdentity,
    VersionComparator,
};
pub use resolver::{
    DuplicateResolver, Reason, Resolution, ResolutionDecision, ResolutionStats,
    ResolutionStrategy, ResolveError, ResolverConfig, Verdict,
};
