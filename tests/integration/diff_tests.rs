use std::fs;
use std::path::Path;

use tempfile::TempDir;
use treeclean::diff::{diff_trees, DiffConfig, DiffStatus};
use treeclean::error::ExitCode;
use treeclean::output::{DiffCsvOutput, DiffTextOutput, JsonDiffOutput};
use treeclean::scanner::ScanConfig;

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn trees() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    fs::create_dir(&a).unwrap();
    fs::create_dir(&b).unwrap();
    (dir, a, b)
}

#[test]
fn test_diff_classifies_every_path() {
    let (_dir, a, b) = trees();
    write(&a, "same.txt", b"same");
    write(&b, "same.txt", b"same");
    write(&a, "src/main.rs", b"fn main() {}");
    write(&b, "src/main.rs", b"fn main() { run(); }");
    write(&a, "old.txt", b"old");
    write(&b, "docs/new.md", b"# new");

    let report = diff_trees(&a, &b, &ScanConfig::default(), DiffConfig::default()).unwrap();

    let status = |p: &str| {
        report
            .records
            .iter()
            .find(|r| r.relative_path == p)
            .map(|r| r.status)
    };
    assert_eq!(status("same.txt"), Some(DiffStatus::Identical));
    assert_eq!(status("src/main.rs"), Some(DiffStatus::Differs));
    assert_eq!(status("old.txt"), Some(DiffStatus::OnlyA));
    assert_eq!(status("docs/new.md"), Some(DiffStatus::OnlyB));

    let differs = report
        .records
        .iter()
        .find(|r| r.relative_path == "src/main.rs")
        .unwrap();
    assert_eq!(differs.size_delta, Some(8));
    assert!(!differs.hash_mismatch);

    assert_eq!(report.summary.files_a, 3);
    assert_eq!(report.summary.files_b, 3);
    assert_eq!(report.summary.flagged(), 3);
    assert_eq!(report.summary.exit_code(), ExitCode::Success);
}

#[test]
fn test_same_size_change_needs_strict_mode() {
    let (_dir, a, b) = trees();
    write(&a, "config.ini", b"debug=0");
    write(&b, "config.ini", b"debug=1");

    let lenient = diff_trees(&a, &b, &ScanConfig::default(), DiffConfig::default()).unwrap();
    assert_eq!(lenient.records[0].status, DiffStatus::Identical);
    assert_eq!(lenient.summary.exit_code(), ExitCode::NothingFlagged);

    let strict = diff_trees(
        &a,
        &b,
        &ScanConfig::default(),
        DiffConfig::default().with_strict(true),
    )
    .unwrap();
    assert_eq!(strict.records[0].status, DiffStatus::Differs);
    assert!(strict.records[0].hash_mismatch);
    assert_eq!(strict.records[0].size_delta, Some(0));
    assert_eq!(strict.summary.hashed_pairs, 1);
}

#[test]
fn test_ignored_segments_apply_to_both_trees() {
    let (_dir, a, b) = trees();
    write(&a, ".git/HEAD", b"ref: main");
    write(&b, "node_modules/pkg/index.js", b"module.exports = 1");
    write(&a, "lib.rs", b"pub fn f() {}");
    write(&b, "lib.rs", b"pub fn f() {}");

    let report = diff_trees(&a, &b, &ScanConfig::default(), DiffConfig::default()).unwrap();

    assert!(report.summary.is_clean());
    assert_eq!(report.records.len(), 1);
}

#[cfg(unix)]
#[test]
fn test_unicode_forms_pair_up() {
    let (_dir, a, b) = trees();
    write(&a, "cafe\u{301}.txt", b"espresso");
    write(&b, "caf\u{e9}.txt", b"espresso");

    let report = diff_trees(&a, &b, &ScanConfig::default(), DiffConfig::default()).unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].status, DiffStatus::Identical);
}

#[cfg(target_os = "linux")]
#[test]
fn test_unicode_spellings_in_one_tree_are_both_reported() {
    let (_dir, a, b) = trees();
    write(&a, "caf\u{e9}.txt", b"composed");
    write(&a, "cafe\u{301}.txt", b"decomposed");

    let report = diff_trees(&a, &b, &ScanConfig::default(), DiffConfig::default()).unwrap();

    assert_eq!(report.summary.files_a, 2);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.summary.only_a, 2);
    assert_eq!(report.summary.key_collisions, 1);
}

#[test]
fn test_diff_renderers_agree() {
    let (_dir, a, b) = trees();
    write(&a, "gone.txt", b"x");
    write(&b, "added.txt", b"y");
    write(&a, "kept.txt", b"z");
    write(&b, "kept.txt", b"z");

    let report = diff_trees(&a, &b, &ScanConfig::default(), DiffConfig::default()).unwrap();

    let text = {
        let mut buf = Vec::new();
        DiffTextOutput::new(&report, false)
            .with_color(false)
            .write_to(&mut buf)
            .unwrap();
        String::from_utf8(buf).unwrap()
    };
    assert!(text.contains("[ONLY A] gone.txt"));
    assert!(text.contains("[ONLY B] added.txt"));
    assert!(!text.contains("kept.txt"));

    let csv = DiffCsvOutput::new(&report, true).to_string().unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.contains("kept.txt,IDENTICAL"));

    let mut json = Vec::new();
    JsonDiffOutput::new(&report, false, report.summary.exit_code())
        .write_to(&mut json)
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value["records"].as_array().unwrap().len(), 2);
    assert_eq!(value["summary"]["only_a"], 1);
    assert_eq!(value["exit_code"], 0);
}
