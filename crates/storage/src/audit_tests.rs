// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use lk_core::{Clock, FakeClock};
use std::time::Duration;
use tempfile::tempdir;

fn record(clock: &FakeClock, spawn_id: &SpawnId, action: &str) -> AuditRecord {
    AuditRecord {
        timestamp: clock.utc(),
        spawn_id: spawn_id.clone(),
        parent_wu_id: "WU-1".into(),
        target_wu_id: "WU-2".into(),
        lane: "Core".to_string(),
        action: action.to_string(),
        reason: "test".to_string(),
        lock: None,
    }
}

#[test]
fn write_names_file_by_spawn_and_time() {
    let dir = tempdir().unwrap();
    let log = AuditLog::new(dir.path().join("recovery"));
    let clock = FakeClock::new();
    let id = SpawnId::from_string("spn-abc");

    let path = log.write(&record(&clock, &id, "released_zombie")).unwrap();

    assert_eq!(path.file_name().unwrap(), "spn-abc-20260101T000000.000Z.json");
    let stored: AuditRecord = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(stored.action, "released_zombie");
}

#[test]
fn same_millisecond_never_overwrites() {
    let dir = tempdir().unwrap();
    let log = AuditLog::new(dir.path());
    let clock = FakeClock::new();
    let id = SpawnId::from_string("spn-abc");

    let first = log.write(&record(&clock, &id, "escalated_stuck")).unwrap();
    let second = log.write(&record(&clock, &id, "escalated_stuck")).unwrap();

    assert_ne!(first, second);
    assert_eq!(log.list().unwrap().len(), 2);
}

#[test]
fn list_is_oldest_first() {
    let dir = tempdir().unwrap();
    let log = AuditLog::new(dir.path());
    let clock = FakeClock::new();
    let id = SpawnId::from_string("spn-abc");

    clock.advance(Duration::from_secs(60));
    log.write(&record(&clock, &id, "second")).unwrap();
    clock.rewind(Duration::from_secs(120));
    log.write(&record(&clock, &id, "first")).unwrap();

    let actions: Vec<_> = log.list().unwrap().into_iter().map(|r| r.action).collect();
    assert_eq!(actions, vec!["first", "second"]);
}

#[test]
fn list_of_missing_dir_is_empty() {
    let dir = tempdir().unwrap();
    assert!(AuditLog::new(dir.path().join("none")).list().unwrap().is_empty());
}
