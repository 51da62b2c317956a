// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::time::Duration;
use tempfile::tempdir;

const VARS: &[&str] = &[
    "LK_STATE_DIR",
    "LK_REMOTE",
    "LK_TRUNK",
    "LK_LANE_STALE_SECS",
    "LK_MERGE_STALE_SECS",
    "LK_CLEANUP_STALE_SECS",
    "LK_STATE_STALE_SECS",
    "LK_LOCK_WAIT_MS",
    "LK_MERGE_RETRIES",
    "LK_PUSH_RETRIES",
    "LK_SPAWN_STALE_SECS",
    "LK_CHECKPOINT_ESCALATE_SECS",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_without_file_or_env() {
    clear_env();
    let dir = tempdir().unwrap();

    let config = Config::load(dir.path()).unwrap();

    assert_eq!(config, Config::defaults(dir.path()));
    assert_eq!(config.state_dir, dir.path().join(".lanekeeper"));
    assert_eq!(config.lock_dir(), dir.path().join(".lanekeeper/locks"));
    assert_eq!(config.merge.trunk, "main");
    assert!(config.locks.cleanup_stale_after < config.monitor.spawn_stale_after);
}

#[test]
#[serial]
fn file_overrides_defaults() {
    clear_env();
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join(Config::FILE_NAME),
        r#"
state_dir = "var/lk"
trunk = "develop"
gates = ["cargo test"]

[locks]
cleanup_stale_secs = 120
wait_ms = 1500

[merge]
retries = 5

[monitor]
checkpoint_escalate_secs = 600
"#,
    )
    .unwrap();

    let config = Config::load(dir.path()).unwrap();

    assert_eq!(config.state_dir, dir.path().join("var/lk"));
    assert_eq!(config.merge.trunk, "develop");
    assert_eq!(config.merge.remote, "origin");
    assert_eq!(config.gates, vec!["cargo test"]);
    assert_eq!(config.locks.cleanup_stale_after, Duration::from_secs(120));
    assert_eq!(config.locks.default_wait, Duration::from_millis(1500));
    assert_eq!(config.merge.retries, 5);
    assert_eq!(config.monitor.checkpoint_escalate_after, Duration::from_secs(600));
}

#[test]
#[serial]
fn env_overrides_file() {
    clear_env();
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(Config::FILE_NAME), "[merge]\nretries = 5\n").unwrap();
    std::env::set_var("LK_MERGE_RETRIES", "2");
    std::env::set_var("LK_STATE_DIR", "/srv/lk-state");
    std::env::set_var("LK_SPAWN_STALE_SECS", "60");

    let config = Config::load(dir.path()).unwrap();
    clear_env();

    assert_eq!(config.merge.retries, 2);
    assert_eq!(config.state_dir, PathBuf::from("/srv/lk-state"));
    assert_eq!(config.monitor.spawn_stale_after, Duration::from_secs(60));
}

#[test]
#[serial]
fn unparseable_env_is_ignored() {
    clear_env();
    let dir = tempdir().unwrap();
    std::env::set_var("LK_PUSH_RETRIES", "lots");

    let config = Config::load(dir.path()).unwrap();
    clear_env();

    assert_eq!(config.merge.push_retries, MergePolicy::default().push_retries);
}

#[test]
#[serial]
fn unknown_file_keys_are_rejected() {
    clear_env();
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(Config::FILE_NAME), "[locks]\nlane_stale = 5\n").unwrap();

    let err = Config::load(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}
