use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;
use treeclean::actions::{ArchiveMover, MoveStatus};
use treeclean::scanner::FileEntry;

fn entry(root: &Path, rel: &str, content: &[u8]) -> FileEntry {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    FileEntry::new(PathBuf::from(rel), path, content.len() as u64)
}

#[test]
fn test_existing_archive_file_is_never_overwritten() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("archive");
    fs::create_dir(&archive).unwrap();
    fs::write(archive.join("photo.jpg"), b"already archived").unwrap();

    let file = entry(&dir.path().join("tree"), "photo.jpg", b"new copy");
    let outcome = ArchiveMover::new(&archive).archive(&file);

    assert_eq!(outcome.status, MoveStatus::Moved);
    assert!(outcome.disambiguated);
    let destination = outcome.destination.unwrap();
    assert_ne!(destination, archive.join("photo.jpg"));
    assert_eq!(destination.extension().unwrap(), "jpg");
    assert_eq!(fs::read(archive.join("photo.jpg")).unwrap(), b"already archived");
    assert_eq!(fs::read(destination).unwrap(), b"new copy");
}

#[test]
fn test_archive_root_created_on_first_move() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("nested").join("archive");
    let file = entry(&dir.path().join("tree"), "a.txt", b"abc");

    let outcome = ArchiveMover::new(&archive).archive(&file);

    assert_eq!(outcome.status, MoveStatus::Moved);
    assert!(archive.join("a.txt").exists());
    assert!(!file.absolute_path.exists());
}

#[test]
fn test_dry_run_plans_without_creating_anything() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("archive");
    let file = entry(&dir.path().join("tree"), "a.txt", b"abc");

    let mover = ArchiveMover::new(&archive).with_dry_run(true);
    let first = mover.archive(&file);
    let second = mover.archive(&entry(&dir.path().join("tree"), "b/a.txt", b"xyz"));

    assert_eq!(first.status, MoveStatus::Planned);
    assert_eq!(first.destination.as_deref(), Some(archive.join("a.txt").as_path()));
    // Planned names are reserved too.
    assert!(second.disambiguated);
    assert!(!archive.exists());
    assert!(file.absolute_path.exists());
}

#[test]
fn test_modified_source_is_not_moved() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("archive");
    let file = entry(&dir.path().join("tree"), "log.txt", b"short");
    fs::write(&file.absolute_path, b"grew since the scan").unwrap();

    let outcome = ArchiveMover::new(&archive).archive(&file);

    assert_eq!(outcome.status, MoveStatus::Failed);
    assert!(outcome.error.unwrap().contains("modified"));
    assert!(file.absolute_path.exists());
}

#[test]
fn test_missing_source_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("archive");
    let gone = entry(&dir.path().join("tree"), "gone.txt", b"bye");
    let kept = entry(&dir.path().join("tree"), "here.txt", b"hi");
    fs::remove_file(&gone.absolute_path).unwrap();

    let rows = Mutex::new(Vec::new());
    let batch = ArchiveMover::new(&archive).archive_all(
        &[&gone, &kept],
        2,
        None,
        None,
        |index, outcome| rows.lock().unwrap().push((index, outcome.status)),
    );

    assert_eq!(batch.moved, 1);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.bytes_reclaimed, 2);
    assert!(!batch.interrupted);
    assert_eq!(batch.outcomes[0].status, MoveStatus::Failed);
    assert!(batch.outcomes[0].error.as_deref().unwrap().contains("missing"));
    assert_eq!(batch.outcomes[1].status, MoveStatus::Moved);

    let mut rows = rows.into_inner().unwrap();
    rows.sort_by_key(|(i, _)| *i);
    assert_eq!(rows, vec![(0, MoveStatus::Failed), (1, MoveStatus::Moved)]);
}

#[test]
fn test_parallel_moves_with_same_name_never_collide() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("archive");
    let files: Vec<FileEntry> = (0..6)
        .map(|i| {
            entry(
                &dir.path().join("tree"),
                &format!("d{i}/same.dat"),
                format!("content {i}").as_bytes(),
            )
        })
        .collect();
    let refs: Vec<&FileEntry> = files.iter().collect();

    let batch = ArchiveMover::new(&archive).archive_all(&refs, 4, None, None, |_, _| {});

    assert_eq!(batch.moved, 6);
    let mut names: Vec<_> = fs::read_dir(&archive)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 6);
}
