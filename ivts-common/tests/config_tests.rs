//! Unit tests for configuration and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate IVTS_ROOT_FOLDER are marked with #[serial].

use ivts_common::config::{
    DocumentFormat, RootFolderInitializer, RootFolderResolver, ServiceConfig,
    MAX_THRESHOLD_MINUTES, ROOT_FOLDER_ENV,
};
use ivts_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_resolver_cli_arg_wins_over_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/ivts-test-env-folder");

    let resolver = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/ivts-test-cli-folder")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/ivts-test-cli-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/ivts-test-env-folder");

    let resolver = RootFolderResolver::new("test-module");
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/ivts-test-env-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_without_overrides_returns_some_path() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert!(!root_folder.as_os_str().is_empty());
}

#[test]
fn test_initializer_creates_directory_and_paths() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join("ivts.db"));
    assert_eq!(initializer.config_path(), root.join("ivts.toml"));
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig::load(&temp_dir.path().join("absent.toml")).unwrap();

    assert_eq!(config, ServiceConfig::default());
    assert_eq!(config.session.completion_grace_minutes, 30);
    assert_eq!(config.session.idle_gap_minutes, 15);
    assert!(config.session.record_completion_line);
    assert_eq!(config.sweep.stale_after_minutes, 30);
    assert!(config.sweep.purge_processed);
}

#[test]
fn test_partial_config_keeps_remaining_defaults() {
    let config = ServiceConfig::from_toml_str(
        r#"
        [server]
        port = 6000

        [session]
        record_completion_line = false

        [sweep]
        archive_dir = "/var/archive"
        "#,
    )
    .unwrap();

    assert_eq!(config.server.port, 6000);
    assert_eq!(config.server.bind_addr, "127.0.0.1");
    assert!(!config.session.record_completion_line);
    assert_eq!(config.session.idle_gap_minutes, 15);
    assert_eq!(
        config.sweep.resolved_archive_dir(&PathBuf::from("/root")),
        PathBuf::from("/var/archive")
    );
}

#[test]
fn test_relative_archive_dir_resolves_against_root() {
    let config = ServiceConfig::default();
    assert_eq!(
        config.sweep.resolved_archive_dir(&PathBuf::from("/srv/ivts")),
        PathBuf::from("/srv/ivts/transcripts")
    );
}

#[test]
fn test_malformed_config_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("ivts.toml");
    std::fs::write(&path, "[session\nidle_gap_minutes = ").unwrap();

    assert!(matches!(ServiceConfig::load(&path), Err(Error::Config(_))));
}

#[test]
fn test_invalid_thresholds_rejected() {
    let err = ServiceConfig::from_toml_str("[session]\nidle_gap_minutes = 0\n").unwrap_err();
    assert!(err.to_string().contains("idle_gap_minutes"));

    let err = ServiceConfig::from_toml_str("[sweep]\ninterval_secs = 0\n").unwrap_err();
    assert!(err.to_string().contains("interval_secs"));
}

#[test]
fn test_oversized_thresholds_rejected() {
    let err = ServiceConfig::from_toml_str("[session]\ncompletion_grace_minutes = 100000000000000\n")
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("completion_grace_minutes"));

    let err = ServiceConfig::from_toml_str("[session]\nidle_gap_minutes = 100000000000000\n")
        .unwrap_err();
    assert!(err.to_string().contains("idle_gap_minutes"));

    let err = ServiceConfig::from_toml_str("[sweep]\nstale_after_minutes = 100000000000000\n")
        .unwrap_err();
    assert!(err.to_string().contains("stale_after_minutes"));

    // One week is still accepted
    let config = ServiceConfig::from_toml_str(&format!(
        "[session]\ncompletion_grace_minutes = {}\n",
        MAX_THRESHOLD_MINUTES
    ))
    .unwrap();
    assert_eq!(config.session.completion_grace_minutes, MAX_THRESHOLD_MINUTES);
}

#[test]
fn test_document_format_defaults_to_pdf() {
    assert_eq!(ServiceConfig::default().sweep.document_format, DocumentFormat::Pdf);

    let config = ServiceConfig::from_toml_str("[sweep]\ndocument_format = \"text\"\n").unwrap();
    assert_eq!(config.sweep.document_format, DocumentFormat::Text);

    let err = ServiceConfig::from_toml_str("[sweep]\ndocument_format = \"docx\"\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
