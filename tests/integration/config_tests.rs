use std::fs;

use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use tempfile::tempdir;
use treeclean::config::{Config, ConfigError, Preset, RunConfig};
use treeclean::diff::{diff_trees, DiffStatus};
use treeclean::duplicates::{ResolutionStrategy, VersionComparator};
use treeclean::scanner::ScanConfig;

#[test]
fn test_config_load_defaults() {
    // Figment without Env so other tests' variables cannot leak in
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.io_threads, 4);
    assert_eq!(config.version_comparator, VersionComparator::Structured);
    assert_eq!(config.report_file_name, "cleanup_report.csv");
    assert!(config.ignore_segments.iter().any(|s| s == ".git"));
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
io_threads = 8
version_comparator = "lexical"
ignore_segments = ["target", "dist"]
"#,
    )
    .unwrap();

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.io_threads, 8);
    assert_eq!(config.version_comparator, VersionComparator::Lexical);
    assert_eq!(config.ignore_segments, vec!["target", "dist"]);
    // Unset keys keep their defaults
    assert_eq!(config.report_file_name, "cleanup_report.csv");
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("TREECLEAN_ARCHIVE_PREFIX", "Old_Files");

    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "archive_prefix = \"From_File\"\n").unwrap();
    let config = Config::load(Some(&config_path)).unwrap();

    assert_eq!(config.archive_prefix, "Old_Files");

    std::env::remove_var("TREECLEAN_ARCHIVE_PREFIX");
}

#[test]
fn test_persisted_strict_mode_reaches_the_differ() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "diff_strict_mode = true\n").unwrap();
    let config = Config::load(Some(&config_path)).unwrap();
    assert!(config.diff_strict_mode);

    let a = temp_dir.path().join("a");
    let b = temp_dir.path().join("b");
    fs::create_dir(&a).unwrap();
    fs::create_dir(&b).unwrap();
    fs::write(a.join("notes.txt"), b"alpha").unwrap();
    fs::write(b.join("notes.txt"), b"omega").unwrap();

    let diff_config = config.diff_config(false, None);
    let report = diff_trees(&a, &b, &ScanConfig::default(), diff_config).unwrap();
    assert_eq!(report.records[0].status, DiffStatus::Differs);
    assert!(report.records[0].hash_mismatch);
}

#[test]
fn test_config_invalid_value_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "version_comparator = \"semver\"\n").unwrap();

    let result = Config::load(Some(&config_path));
    assert!(matches!(result, Err(ConfigError::Figment(_))));
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let temp_dir = tempdir().unwrap();
    let config = Config::load(Some(&temp_dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config.report_file_name, Config::default().report_file_name);
}

#[test]
fn test_run_config_inherits_persisted_settings() {
    let config = Config {
        io_threads: 2,
        version_comparator: VersionComparator::Lexical,
        ..Config::default()
    };
    let run = RunConfig::from_config(&config, "/scan", "/archive").with_preset(Preset::Fonts);

    assert_eq!(run.io_threads, 2);
    assert_eq!(run.comparator, VersionComparator::Lexical);
    assert_eq!(run.resolution_strategy, ResolutionStrategy::VersionAware);
    assert!(run.extension_filter.as_ref().unwrap().contains("ttf"));
}

#[test]
fn test_run_config_rejects_scan_root_inside_archive() {
    let temp_dir = tempdir().unwrap();
    let archive = temp_dir.path().join("archive");
    let scan = archive.join("restored");
    fs::create_dir_all(&scan).unwrap();

    let result = RunConfig::new(&scan, &archive).validate();
    assert!(matches!(
        result,
        Err(ConfigError::ScanRootInsideArchive { .. })
    ));
}

#[test]
fn test_run_config_allows_archive_inside_scan_root() {
    let temp_dir = tempdir().unwrap();
    let archive = temp_dir.path().join("Cleanup_Archive");
    assert!(RunConfig::new(temp_dir.path(), &archive).validate().is_ok());
}
