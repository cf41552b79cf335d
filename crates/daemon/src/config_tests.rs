// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

const FULL: &str = r#"
storage_folder = "/srv/pv"
max_sessions = 20
filesystem = "clone"
destroy_timeout = "90s"
remove_folders = false

[log]
level = "debug,pv_engine=trace"
dir = "/var/log/pv"

[[applications]]
name = "shop"
remote = "git@example.com:shop.git"
start = ["npm ci", { command = "npm start", timeout = "5m" }]
watch = ["main"]
max_sessions = 3

[applications.startup]
timeout = "10m"
retries = 2

[applications.healthcheck]
path = "/health"
status = 204

[[applications.branches]]
pattern = "^release/"
start = ["npm run start:prod"]
"#;

#[test]
fn full_file_parses() {
    let config = DaemonConfig::parse(FULL).unwrap();

    assert_eq!(config.storage_folder, PathBuf::from("/srv/pv"));
    assert_eq!(config.max_sessions, Some(20));
    assert_eq!(config.filesystem, FilesystemStrategy::Clone);
    assert_eq!(config.destroy_timeout, Duration::from_secs(90));
    assert!(!config.remove_folders);
    assert_eq!(config.log.level, "debug,pv_engine=trace");
    assert_eq!(config.log.dir, Some(PathBuf::from("/var/log/pv")));

    let shop = &config.applications[0];
    assert_eq!(shop.name, "shop");
    assert_eq!(shop.start.len(), 2);
    assert_eq!(shop.start[1].timeout, Some(Duration::from_secs(300)));
    assert_eq!(shop.startup.retries, 2);
    assert_eq!(shop.startup.timeout, Duration::from_secs(600));
    assert_eq!(shop.healthcheck.as_ref().map(|h| h.status), Some(204));
    assert_eq!(shop.max_sessions, Some(3));
    assert_eq!(shop.for_checkout("release/1.2").start[0].command, "npm run start:prod");
}

#[test]
fn defaults_fill_missing_settings() {
    let config = DaemonConfig::parse("").unwrap();

    assert_eq!(config.destroy_timeout, DEFAULT_DESTROY_TIMEOUT);
    assert_eq!(config.filesystem, FilesystemStrategy::Copy);
    assert!(config.remove_folders);
    assert_eq!(config.log, LogConfig::default());
    assert!(config.applications.is_empty());

    let engine = config.engine_config();
    assert_eq!(engine.storage_folder, config.storage_folder);
    assert_eq!(engine.max_sessions, None);
}

#[test]
fn duplicate_applications_are_rejected() {
    let text = r#"
[[applications]]
name = "shop"
remote = "a"

[[applications]]
name = "shop"
remote = "b"
"#;
    let err = DaemonConfig::parse(text).unwrap_err();
    assert!(matches!(err, DaemonConfigError::Invalid(ConfigError::DuplicateApplication(ref n)) if n == "shop"));
}

#[test]
fn unknown_keys_are_rejected() {
    let err = DaemonConfig::parse("storage = \"/tmp\"").unwrap_err();
    assert!(matches!(err, DaemonConfigError::Parse(_)));
}

#[test]
#[serial]
fn storage_override_applies_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pvd.toml");
    std::fs::write(&path, "storage_folder = \"/srv/pv\"\n").unwrap();

    std::env::set_var(crate::env::STORAGE_DIR_VAR, "/data/pv");
    let config = DaemonConfig::load(&path).unwrap();
    std::env::remove_var(crate::env::STORAGE_DIR_VAR);

    assert_eq!(config.storage_folder, PathBuf::from("/data/pv"));
    assert_eq!(config.lock_path(), PathBuf::from("/data/pv/pvd.pid"));
}

#[test]
fn missing_file_names_the_path() {
    let err = DaemonConfig::load(Path::new("/nonexistent/pvd.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/pvd.toml"));
}
