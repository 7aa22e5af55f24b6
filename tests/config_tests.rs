use roomtail::{ConfigError, load_profile};
use std::path::PathBuf;
use tempfile::tempdir;

const SETTINGS: &str = r#"
[profile.default]
log_dir = "/data/logs"
user_display_name = "Alice"
check_interval_secs = 30

[profile.alt]
log_dir = "/data/other"
user_display_name = "Bob"
"#;

#[test]
fn loads_a_full_profile() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("setting.toml");
    std::fs::write(&path, SETTINGS).unwrap();

    let profile = load_profile(&path, "default").unwrap();
    assert_eq!(profile.log_dir, PathBuf::from("/data/logs"));
    assert_eq!(profile.user_display_name, "Alice");
    assert_eq!(profile.check_interval_secs, 30);
}

#[test]
fn check_interval_defaults_when_omitted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("setting.toml");
    std::fs::write(&path, SETTINGS).unwrap();

    let profile = load_profile(&path, "alt").unwrap();
    assert_eq!(profile.user_display_name, "Bob");
    assert_eq!(profile.check_interval_secs, 60);
}

#[test]
fn unknown_profile_is_reported_by_name() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("setting.toml");
    std::fs::write(&path, SETTINGS).unwrap();

    let err = load_profile(&path, "missing").unwrap_err();
    assert!(matches!(err, ConfigError::MissingProfile(name) if name == "missing"));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("setting.toml");
    std::fs::write(&path, "[profile.default\nlog_dir = nope").unwrap();

    assert!(matches!(
        load_profile(&path, "default"),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        load_profile(dir.path().join("absent.toml"), "default"),
        Err(ConfigError::Read { .. })
    ));
}
