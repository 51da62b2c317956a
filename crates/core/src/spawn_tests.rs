// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::{Clock, FakeClock};

fn record() -> SpawnRecord {
    SpawnRecord::new("WU-1".into(), "WU-2".into(), "Core", FakeClock::new().utc())
}

#[test]
fn new_record_is_pending() {
    let r = record();
    assert_eq!(r.status, SpawnStatus::Pending);
    assert!(r.completed_at.is_none());
    assert!(r.id.as_str().starts_with(SpawnId::PREFIX));
}

#[yare::parameterized(
    completed = { SpawnStatus::Completed },
    timeout   = { SpawnStatus::Timeout },
    crashed   = { SpawnStatus::Crashed },
)]
fn finishing_sets_completed_at(status: SpawnStatus) {
    let clock = FakeClock::new();
    let mut r = record();
    r.finish(status, clock.utc()).unwrap();
    assert_eq!(r.status, status);
    assert_eq!(r.completed_at, Some(clock.utc()));
}

#[test]
fn terminal_status_cannot_change() {
    let clock = FakeClock::new();
    let mut r = record();
    r.finish(SpawnStatus::Crashed, clock.utc()).unwrap();
    let err = r.finish(SpawnStatus::Completed, clock.utc()).unwrap_err();
    assert_eq!(err.status, SpawnStatus::Crashed);
    assert_eq!(r.status, SpawnStatus::Crashed);
}

#[test]
fn record_serializes_camel_case() {
    let json = serde_json::to_value(record()).unwrap();
    assert_eq!(json["parentWuId"], "WU-1");
    assert_eq!(json["targetWuId"], "WU-2");
    assert_eq!(json["status"], "pending");
    assert!(json.get("completedAt").is_none());
}
