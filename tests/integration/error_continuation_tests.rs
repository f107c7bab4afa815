use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use treeclean::actions::{ArchiveMover, MoveStatus};
use treeclean::duplicates::{
    DuplicateResolver, FilenameIdentityExtractor, Reason, ResolutionStrategy, ResolverConfig,
    Verdict,
};
use treeclean::scanner::{FileEntry, ScanConfig, Walker};

#[test]
fn test_unreadable_candidates_are_kept() {
    let dir = TempDir::new().unwrap();
    let real = dir.path().join("real.txt");
    fs::write(&real, b"0123456789").unwrap();

    // Same size as the real file, so all three are hashed.
    let entries: Vec<Arc<FileEntry>> = vec![
        Arc::new(FileEntry::new(PathBuf::from("real.txt"), real, 10)),
        Arc::new(FileEntry::new(
            PathBuf::from("missing_1.txt"),
            dir.path().join("missing_1.txt"),
            10,
        )),
        Arc::new(FileEntry::new(
            PathBuf::from("missing_2.txt"),
            dir.path().join("missing_2.txt"),
            10,
        )),
    ];

    let resolution = DuplicateResolver::new(ResolverConfig::default())
        .resolve(&entries)
        .unwrap();

    assert_eq!(resolution.stats.hash_failures, 2);
    assert_eq!(resolution.stats.flagged, 0);
    for decision in &resolution.decisions[1..] {
        assert_eq!(decision.verdict, Verdict::Keep);
        assert!(matches!(decision.reason, Reason::Unreadable(_)));
    }
}

#[test]
fn test_files_without_identity_are_kept() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Arial.ttf"), b"glyphs").unwrap();
    fs::write(dir.path().join("Inter-v1.0.ttf"), b"other glyphs").unwrap();
    let entries = Walker::new(dir.path(), ScanConfig::default()).scan().entries;

    let resolver = DuplicateResolver::new(
        ResolverConfig::default().with_strategy(ResolutionStrategy::VersionAware),
    )
    .with_extractor(Arc::new(FilenameIdentityExtractor::new().unwrap()));
    let resolution = resolver.resolve(&entries).unwrap();

    assert_eq!(resolution.stats.flagged, 0);
    assert_eq!(resolution.stats.extraction_failures, 1);
    let arial = resolution
        .decisions
        .iter()
        .find(|d| d.entry.relative_path == Path::new("Arial.ttf"))
        .unwrap();
    assert!(matches!(arial.reason, Reason::IdentityUnavailable(_)));
}

#[test]
fn test_vanished_file_fails_alone() {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("tree");
    fs::create_dir(&tree).unwrap();
    for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
        fs::write(tree.join(name), b"same bytes").unwrap();
    }
    let entries = Walker::new(&tree, ScanConfig::default()).scan().entries;
    let resolution = DuplicateResolver::new(ResolverConfig::default())
        .resolve(&entries)
        .unwrap();
    assert_eq!(resolution.stats.flagged, 3);

    // Another process removes one of the losers between resolve and archive.
    fs::remove_file(tree.join("c.txt")).unwrap();

    let flagged: Vec<&FileEntry> = resolution.flagged().map(|d| d.entry.as_ref()).collect();
    let batch = ArchiveMover::new(&dir.path().join("archive")).archive_all(
        &flagged,
        2,
        None,
        None,
        |_, _| {},
    );

    assert_eq!(batch.moved, 2);
    assert_eq!(batch.failed, 1);
    let failed = batch
        .outcomes
        .iter()
        .find(|o| o.status == MoveStatus::Failed)
        .unwrap();
    assert!(failed.source.ends_with("c.txt"));
    assert!(failed.destination.is_none());
    assert!(tree.join("a.txt").exists());
}
