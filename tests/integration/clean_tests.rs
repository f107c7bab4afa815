use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use treeclean::actions::MoveStatus;
use treeclean::config::RunConfig;
use treeclean::duplicates::{
    DuplicateResolver, ExtractionFailure, IdentityExtractor, LogicalIdentity, Reason,
    ResolutionStrategy, ResolverConfig, Verdict,
};
use treeclean::engine::CleanupEngine;
use treeclean::error::ExitCode;
use treeclean::output::{CsvReportSink, JsonLinesSink, MemorySink};
use treeclean::scanner::{Hasher, ScanConfig, Walker};

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Every file under `root` with its content, keyed by relative path.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                files.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    files
}

fn roots() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let scan = dir.path().join("tree");
    let archive = dir.path().join("archive");
    fs::create_dir(&scan).unwrap();
    (dir, scan, archive)
}

/// Maps `<name>@<version>.<ext>` file names to identities.
struct TaggedNames;

impl IdentityExtractor for TaggedNames {
    fn extract_identity(&self, path: &Path) -> Result<LogicalIdentity, ExtractionFailure> {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        stem.split_once('@')
            .map(|(name, version)| LogicalIdentity::new(name, version))
            .ok_or_else(|| ExtractionFailure::NoIdentity(path.to_path_buf()))
    }
}

#[test]
fn test_exact_keeps_first_and_moves_copy() {
    let (_dir, scan, archive) = roots();
    write(&scan, "a.txt", b"hello");
    write(&scan, "b.txt", b"hello");
    write(&scan, "c.txt", b"world!");

    let mut sink = MemorySink::new();
    let summary = CleanupEngine::new(RunConfig::new(&scan, &archive))
        .run(&mut sink)
        .unwrap();

    assert_eq!(summary.total_scanned, 3);
    assert_eq!(summary.flagged, 1);
    assert_eq!(summary.archived, 1);
    assert_eq!(summary.bytes_reclaimed, 5);
    assert_eq!(summary.potential_savings, 5);
    assert_eq!(summary.exit_code(), ExitCode::Success);

    assert!(scan.join("a.txt").exists());
    assert!(!scan.join("b.txt").exists());
    assert!(scan.join("c.txt").exists());
    assert_eq!(fs::read(archive.join("b.txt")).unwrap(), b"hello");

    let moved: Vec<_> = sink.rows_with(Verdict::Move).collect();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].relative_path, "b.txt");
    assert_eq!(moved[0].status, Some(MoveStatus::Moved));
    assert!(moved[0]
        .conflict_source
        .as_deref()
        .unwrap()
        .ends_with("a.txt"));
    assert_eq!(sink.rows_with(Verdict::Keep).count(), 2);
    assert!(sink.finished);
}

#[test]
fn test_unique_size_is_never_hashed() {
    let (_dir, scan, _archive) = roots();
    write(&scan, "a.txt", b"hello");
    write(&scan, "b.txt", b"hello");
    write(&scan, "c.txt", b"world!");

    let entries = Walker::new(&scan, ScanConfig::default()).scan().entries;
    let hasher = Arc::new(Hasher::new());
    let resolution = DuplicateResolver::new(ResolverConfig::default())
        .with_hasher(Arc::clone(&hasher))
        .resolve(&entries)
        .unwrap();

    assert_eq!(hasher.hashes_computed(), 2);
    let c = resolution
        .decisions
        .iter()
        .find(|d| d.entry.relative_path == Path::new("c.txt"))
        .unwrap();
    assert_eq!(c.reason, Reason::UniqueSize);
    assert!(c.entry.content_hash().is_none());
}

#[test]
fn test_version_aware_supersedes_older_copy() {
    let (_dir, scan, archive) = roots();
    // Scan order puts the older copy first.
    write(&scan, "fonts_1/Arial@1.0.ttf", b"glyphs v1");
    write(&scan, "fonts_2/Arial@2.0.ttf", b"glyphs v2!");

    let config = RunConfig::new(&scan, &archive)
        .with_strategy(ResolutionStrategy::VersionAware)
        .with_extension_filter(["ttf"]);
    let mut sink = MemorySink::new();
    let summary = CleanupEngine::new(config)
        .with_extractor(Arc::new(TaggedNames))
        .run(&mut sink)
        .unwrap();

    assert_eq!(summary.flagged, 1);
    assert!(!scan.join("fonts_1/Arial@1.0.ttf").exists());
    assert!(scan.join("fonts_2/Arial@2.0.ttf").exists());
    assert_eq!(fs::read(archive.join("Arial@1.0.ttf")).unwrap(), b"glyphs v1");

    let moved: Vec<_> = sink.rows_with(Verdict::Move).collect();
    assert_eq!(moved.len(), 1);
    assert!(moved[0].reason.contains("superseded by newer version 2.0"));
}

#[test]
fn test_version_aware_equal_version_keeps_first() {
    let (_dir, scan, archive) = roots();
    write(&scan, "a/Inter@3.19.otf", b"first build");
    write(&scan, "b/Inter@3.19.otf", b"second build!");

    let config = RunConfig::new(&scan, &archive)
        .with_strategy(ResolutionStrategy::VersionAware)
        .with_dry_run(true);
    let mut sink = MemorySink::new();
    CleanupEngine::new(config)
        .with_extractor(Arc::new(TaggedNames))
        .run(&mut sink)
        .unwrap();

    let moved: Vec<_> = sink.rows_with(Verdict::Move).collect();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].relative_path, Path::new("b/Inter@3.19.otf").display().to_string());
    assert!(moved[0].reason.contains("older or equal version"));
}

#[test]
fn test_archive_name_collision_is_disambiguated() {
    let (_dir, scan, archive) = roots();
    write(&scan, "a/orig1.png", b"first picture");
    write(&scan, "b/dup.png", b"first picture");
    write(&scan, "c/orig2.png", b"second picture");
    write(&scan, "d/dup.png", b"second picture");

    let mut sink = MemorySink::new();
    let summary = CleanupEngine::new(RunConfig::new(&scan, &archive))
        .run(&mut sink)
        .unwrap();

    assert_eq!(summary.archived, 2);
    assert_eq!(summary.archive_failures, 0);

    let archived = snapshot(&archive);
    assert_eq!(archived.len(), 2);
    assert!(archived.contains_key(Path::new("dup.png")));
    let mut contents: Vec<_> = archived.values().cloned().collect();
    contents.sort();
    assert_eq!(contents, vec![b"first picture".to_vec(), b"second picture".to_vec()]);

    let destinations: Vec<_> = sink
        .rows_with(Verdict::Move)
        .map(|r| r.destination.clone().unwrap())
        .collect();
    assert_ne!(destinations[0], destinations[1]);
}

#[test]
fn test_dry_run_leaves_filesystem_untouched() {
    let (_dir, scan, archive) = roots();
    write(&scan, "x/report.pdf", b"quarterly");
    write(&scan, "y/report.pdf", b"quarterly");
    write(&scan, "y/notes.txt", b"notes");
    let before = snapshot(&scan);

    let mut sink = MemorySink::new();
    let summary = CleanupEngine::new(RunConfig::new(&scan, &archive).with_dry_run(true))
        .run(&mut sink)
        .unwrap();

    assert_eq!(snapshot(&scan), before);
    assert!(!archive.exists());
    assert!(summary.dry_run);
    assert_eq!(summary.planned, 1);
    assert_eq!(summary.archived, 0);

    let planned: Vec<_> = sink.rows_with(Verdict::Move).collect();
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].status, Some(MoveStatus::Planned));
    assert!(planned[0].destination.as_deref().unwrap().ends_with("report.pdf"));
    assert_eq!(sink.rows.len(), 3);
}

#[test]
fn test_archived_files_are_byte_identical_to_their_source() {
    let (_dir, scan, archive) = roots();
    for i in 0..12 {
        let content = format!("payload {}", i % 4);
        write(&scan, &format!("dir{}/file{i}.bin", i % 3), content.as_bytes());
    }
    let before = snapshot(&scan);

    let mut sink = MemorySink::new();
    let summary = CleanupEngine::new(RunConfig::new(&scan, &archive).with_io_threads(3))
        .run(&mut sink)
        .unwrap();
    assert_eq!(summary.archived, 8);

    for row in sink.rows_with(Verdict::Move) {
        assert_eq!(row.status, Some(MoveStatus::Moved));
        let source = PathBuf::from(&row.source);
        let destination = PathBuf::from(row.destination.as_deref().unwrap());
        assert!(!source.exists());
        let original = &before[Path::new(&row.relative_path)];
        assert_eq!(&fs::read(destination).unwrap(), original);
    }

    // Every distinct content still has exactly one copy in the tree.
    let after = snapshot(&scan);
    assert_eq!(after.len(), 4);
    let mut remaining: Vec<_> = after.values().cloned().collect();
    remaining.sort();
    remaining.dedup();
    assert_eq!(remaining.len(), 4);
}

#[test]
fn test_report_written_to_csv_in_archive() {
    let (_dir, scan, archive) = roots();
    write(&scan, "one.txt", b"same");
    write(&scan, "two.txt", b"same");
    write(&scan, "three.txt", b"different");

    fs::create_dir_all(&archive).unwrap();
    let report_path = archive.join("cleanup_report.csv");
    let mut sink = CsvReportSink::create(&report_path).unwrap();
    CleanupEngine::new(RunConfig::new(&scan, &archive))
        .run(&mut sink)
        .unwrap();
    drop(sink);

    let mut reader = csv::Reader::from_path(&report_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[3], "decision");
    let records: Vec<_> = reader.records().map(Result::unwrap).collect();
    assert_eq!(records.len(), 3);
    let moved: Vec<_> = records.iter().filter(|r| &r[3] == "MOVE").collect();
    assert_eq!(moved.len(), 1);
    assert_eq!(&moved[0][1], "two.txt");
    assert_eq!(&moved[0][7], "MOVED");

    // Both copies were hashed and share a digest; the unique-size file was not read
    assert_eq!(&headers[9], "content_hash");
    let expected = blake3::hash(b"same").to_hex().to_string();
    assert_eq!(&moved[0][9], expected);
    let kept_copy = records.iter().find(|r| &r[1] == "one.txt").unwrap();
    assert_eq!(&kept_copy[9], expected);
    let unique = records.iter().find(|r| &r[1] == "three.txt").unwrap();
    assert_eq!(&unique[9], "");
}

#[test]
fn test_report_written_as_json_lines() {
    let (_dir, scan, archive) = roots();
    write(&scan, "one.txt", b"same");
    write(&scan, "two.txt", b"same");

    fs::create_dir_all(&archive).unwrap();
    let report_path = archive.join("cleanup_report.jsonl");
    let mut sink = JsonLinesSink::create(&report_path).unwrap();
    CleanupEngine::new(RunConfig::new(&scan, &archive))
        .run(&mut sink)
        .unwrap();
    drop(sink);

    let text = fs::read_to_string(&report_path).unwrap();
    let rows: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["decision"], "KEEP");
    assert_eq!(rows[1]["decision"], "MOVE");
    assert_eq!(rows[1]["status"], "MOVED");
    assert_eq!(rows[0]["content_hash"], rows[1]["content_hash"]);
}

#[test]
fn test_second_run_is_a_no_op() {
    let (_dir, scan, archive) = roots();
    write(&scan, "a.txt", b"twin");
    write(&scan, "b/a.txt", b"twin");

    let first = CleanupEngine::new(RunConfig::new(&scan, &archive))
        .run(&mut MemorySink::new())
        .unwrap();
    assert_eq!(first.archived, 1);

    let second = CleanupEngine::new(RunConfig::new(&scan, &archive))
        .run(&mut MemorySink::new())
        .unwrap();
    assert_eq!(second.flagged, 0);
    assert_eq!(second.exit_code(), ExitCode::NothingFlagged);
}

#[test]
fn test_extension_filter_limits_candidates() {
    let (_dir, scan, archive) = roots();
    write(&scan, "a.pdf", b"doc");
    write(&scan, "b.pdf", b"doc");
    write(&scan, "a.txt", b"doc");

    let mut sink = MemorySink::new();
    let summary = CleanupEngine::new(
        RunConfig::new(&scan, &archive)
            .with_extension_filter([".PDF"])
            .with_dry_run(true),
    )
    .run(&mut sink)
    .unwrap();

    assert_eq!(summary.total_scanned, 2);
    assert_eq!(summary.flagged, 1);
    assert!(sink.rows.iter().all(|r| r.relative_path.ends_with(".pdf")));
}
