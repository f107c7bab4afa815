//! Filesystem mutations.
//!
//! The only mutation this crate performs is relocating redundant files into
//! an archive root; nothing is ever deleted outright. See [`archive`].

pub mod archive;

pub use archive::{
    ArchiveBatch, ArchiveMover, ArchiveOutcome, MoveError, MoveStatus,
    MAX_DISAMBIGUATION_ATTEMPTS,
};
