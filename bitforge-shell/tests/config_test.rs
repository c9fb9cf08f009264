//! Config loading and override tests

use bitforge_shell::Config;
use std::io::Write;
use std::path::PathBuf;

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("bitforge.toml")).unwrap();

    assert_eq!(config.api.base_url, "http://localhost:5000");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.sync.feed_poll_ms, 60_000);
    assert_eq!(config.sync.search_debounce_ms, 400);
    assert_eq!(config.sync.presence_poll_ms, 30_000);
    assert_eq!(config.sync.feed_limit, 20);
    assert!(config.storage.data_dir.ends_with("bitforge"));
}

#[test]
fn test_config_with_all_fields() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[api]
base_url = "https://api.bitforge.gg"
timeout_secs = 10

[sync]
feed_poll_ms = 15000
search_debounce_ms = 250
presence_poll_ms = 5000
feed_limit = 50

[storage]
data_dir = "/var/lib/bitforge"
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.api.base_url, "https://api.bitforge.gg");
    assert_eq!(config.api.timeout_secs, 10);
    assert_eq!(config.sync.feed_poll_ms, 15_000);
    assert_eq!(config.sync.search_debounce_ms, 250);
    assert_eq!(config.sync.presence_poll_ms, 5_000);
    assert_eq!(config.sync.feed_limit, 50);
    assert_eq!(config.storage.resolved_data_dir(), PathBuf::from("/var/lib/bitforge"));
}

#[test]
fn test_partial_sections_keep_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[sync]
search_debounce_ms = 100
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.sync.search_debounce_ms, 100);
    assert_eq!(config.sync.feed_poll_ms, 60_000);
    assert_eq!(config.api.timeout_secs, 30);
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[sync\nfeed_poll_ms = ").unwrap();

    let err = Config::load(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("parsing"));
}

#[test]
fn test_overrides_win_over_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[api]
base_url = "https://api.bitforge.gg"

[storage]
data_dir = "/var/lib/bitforge"
"#
    )
    .unwrap();

    let mut config = Config::load(file.path()).unwrap();
    config.apply_overrides(Some("http://127.0.0.1:5000".into()), Some("/tmp/bf".into()));
    assert_eq!(config.api.base_url, "http://127.0.0.1:5000");
    assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/bf"));

    // No overrides leaves the file values alone
    let mut untouched = Config::load(file.path()).unwrap();
    untouched.apply_overrides(None, None);
    assert_eq!(untouched.api.base_url, "https://api.bitforge.gg");
}
