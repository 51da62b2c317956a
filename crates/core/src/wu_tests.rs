// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    plain      = { "WU-1", true },
    long       = { "WU-10423", true },
    lowercase  = { "wu-1", false },
    no_digits  = { "WU-", false },
    letters    = { "WU-12a", false },
    empty      = { "", false },
)]
fn wu_id_well_formed(id: &str, expected: bool) {
    assert_eq!(WuId::from(id).is_well_formed(), expected);
}

#[yare::parameterized(
    ready        = { "\"ready\"", WuStatus::Ready },
    todo         = { "\"todo\"", WuStatus::Ready },
    backlog      = { "\"backlog\"", WuStatus::Ready },
    in_progress  = { "\"in_progress\"", WuStatus::InProgress },
    kebab        = { "\"in-progress\"", WuStatus::InProgress },
    claimed      = { "\"claimed\"", WuStatus::InProgress },
    completed    = { "\"completed\"", WuStatus::Done },
    abandoned    = { "\"abandoned\"", WuStatus::Cancelled },
)]
fn status_accepts_legacy_aliases(json: &str, expected: WuStatus) {
    let parsed: WuStatus = serde_json::from_str(json).unwrap();
    assert_eq!(parsed, expected);
    let unquoted = json.trim_matches('"');
    assert_eq!(unquoted.parse::<WuStatus>().unwrap(), expected);
}

#[test]
fn status_serializes_canonical_name() {
    assert_eq!(serde_json::to_string(&WuStatus::InProgress).unwrap(), "\"in_progress\"");
    assert_eq!(WuStatus::InProgress.to_string(), "in_progress");
}

#[test]
fn unknown_status_is_an_error() {
    assert!("finished-ish".parse::<WuStatus>().is_err());
}

#[yare::parameterized(
    ready       = { WuStatus::Ready, false, false },
    in_progress = { WuStatus::InProgress, false, true },
    blocked     = { WuStatus::Blocked, false, true },
    waiting     = { WuStatus::Waiting, false, true },
    done        = { WuStatus::Done, true, false },
    cancelled   = { WuStatus::Cancelled, true, false },
)]
fn status_classification(status: WuStatus, terminal: bool, claimed: bool) {
    assert_eq!(status.is_terminal(), terminal);
    assert_eq!(status.is_claimed(), claimed);
}

#[test]
fn work_unit_accepts_camel_case_edges() {
    let json =
        r#"{"id":"WU-3","status":"ready","lane":"Ops","blockedBy":["WU-1"],"blocks":["WU-9"]}"#;
    let wu: WorkUnit = serde_json::from_str(json).unwrap();
    assert!(wu.blocked_by.contains("WU-1"));
    assert!(wu.blocks.contains("WU-9"));
    assert!(wu.worktree_path.is_none());
}

#[test]
fn branch_name_prefers_claimed_branch() {
    let wu = WorkUnit::builder().claimed_branch("feature/x").build();
    assert_eq!(wu.branch_name(), "feature/x");
}

#[test]
fn lane_branch_name_slugs_the_lane() {
    let id = WuId::from("WU-42");
    assert_eq!(lane_branch_name("Framework: Core", &id), "lane/framework-core/wu-42");
}
