// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use lk_core::{Clock, FakeClock};
use tempfile::tempdir;

fn spawn(target: &str) -> SpawnRecord {
    SpawnRecord::new("WU-1".into(), target.into(), "Core", FakeClock::new().utc())
}

#[test]
fn empty_registry_has_no_spawns() {
    let dir = tempdir().unwrap();
    let registry = SpawnRegistry::new(dir.path().join("spawns.jsonl"));
    assert!(registry.all().unwrap().is_empty());
}

#[test]
fn register_and_get() {
    let dir = tempdir().unwrap();
    let registry = SpawnRegistry::new(dir.path().join("state/spawns.jsonl"));
    let record = spawn("WU-2");

    registry.register(&record).unwrap();

    assert_eq!(registry.get(&record.id).unwrap(), Some(record));
    assert_eq!(registry.get(&SpawnId::new()).unwrap(), None);
}

#[test]
fn finish_appends_and_last_record_wins() {
    let dir = tempdir().unwrap();
    let registry = SpawnRegistry::new(dir.path().join("spawns.jsonl"));
    let a = spawn("WU-2");
    let b = spawn("WU-3");
    registry.register(&a).unwrap();
    registry.register(&b).unwrap();

    let finished = registry.finish(&a.id, SpawnStatus::Crashed, FakeClock::new().utc()).unwrap();

    assert_eq!(finished.status, SpawnStatus::Crashed);
    let all = registry.all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, a.id);
    assert_eq!(all[0].status, SpawnStatus::Crashed);
    let pending: Vec<_> = registry.pending().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(pending, vec![b.id]);
    assert_eq!(std::fs::read_to_string(registry.path()).unwrap().lines().count(), 3);
}

#[test]
fn finishing_terminal_spawn_is_rejected() {
    let dir = tempdir().unwrap();
    let registry = SpawnRegistry::new(dir.path().join("spawns.jsonl"));
    let record = spawn("WU-2");
    registry.register(&record).unwrap();
    registry.finish(&record.id, SpawnStatus::Completed, FakeClock::new().utc()).unwrap();

    let err =
        registry.finish(&record.id, SpawnStatus::Timeout, FakeClock::new().utc()).unwrap_err();
    assert!(matches!(err, SpawnRegistryError::Transition(_)));
}

#[test]
fn finishing_unknown_spawn_is_not_found() {
    let dir = tempdir().unwrap();
    let registry = SpawnRegistry::new(dir.path().join("spawns.jsonl"));
    let err = registry
        .finish(&SpawnId::new(), SpawnStatus::Completed, FakeClock::new().utc())
        .unwrap_err();
    assert!(matches!(err, SpawnRegistryError::NotFound(_)));
}

#[test]
fn corrupt_line_reports_line_number() {
    let dir = tempdir().unwrap();
    let registry = SpawnRegistry::new(dir.path().join("spawns.jsonl"));
    registry.register(&spawn("WU-2")).unwrap();
    let mut contents = std::fs::read_to_string(registry.path()).unwrap();
    contents.push_str("{broken\n");
    std::fs::write(registry.path(), contents).unwrap();

    match registry.all().unwrap_err() {
        SpawnRegistryError::Parse { line, .. } => assert_eq!(line, 2),
        other => panic!("expected parse error, got {:?}", other),
    }
}
