// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn healthy() -> RecoveryContext {
    RecoveryContext {
        wu_id: "WU-5".into(),
        status: Some(WuStatus::InProgress),
        lane: Some("core".to_string()),
        worktree_path: Some("/repo/worktrees/lane-core-wu-5".into()),
        worktree_exists: true,
        branch: Some("lane/core/wu-5".to_string()),
        branch_exists: true,
        merged: false,
        dirty: false,
        lane_lock: LaneLock::Held { owner_id: "WU-5".to_string(), pid: 42 },
    }
}

fn codes(analysis: &RecoveryAnalysis) -> Vec<IssueCode> {
    analysis.issues.iter().map(|i| i.code).collect()
}

fn kinds(analysis: &RecoveryAnalysis) -> Vec<ActionKind> {
    analysis.actions.iter().map(|a| a.kind).collect()
}

#[test]
fn healthy_context_has_no_issues() {
    let analysis = analyze_recovery(&healthy());

    assert!(!analysis.has_issues);
    assert!(analysis.issues.is_empty());
    assert!(analysis.actions.is_empty());
    assert_eq!(analysis.wu_id.as_str(), "WU-5");
}

#[test]
fn unknown_wu_with_nothing_on_disk_is_healthy() {
    let analysis = analyze_recovery(&RecoveryContext::empty("WU-8".into()));
    assert!(!analysis.has_issues);
}

#[test]
fn worktree_without_claim_is_partial_claim() {
    let ctx =
        RecoveryContext { status: Some(WuStatus::Ready), lane_lock: LaneLock::Free, ..healthy() };

    let analysis = analyze_recovery(&ctx);

    assert_eq!(codes(&analysis), vec![IssueCode::PartialClaim]);
    assert_eq!(kinds(&analysis), vec![ActionKind::Resume, ActionKind::Reset]);
    let resume = analysis.action(ActionKind::Resume).unwrap();
    assert_eq!(resume.command, "lk recover run --wu WU-5 --action resume");
    assert!(!resume.requires_force);
}

#[test]
fn dirty_partial_claim_reset_needs_force() {
    let ctx = RecoveryContext { status: Some(WuStatus::Ready), dirty: true, ..healthy() };

    let reset = analyze_recovery(&ctx).action(ActionKind::Reset).cloned().unwrap();

    assert!(reset.requires_force);
    assert_eq!(reset.command, "lk recover run --wu WU-5 --action reset --force");
    assert!(reset.warning.unwrap().contains("uncommitted changes"));
}

#[test]
fn missing_worktree_while_claimed_is_orphan_claim() {
    let ctx = RecoveryContext {
        worktree_exists: false,
        branch_exists: false,
        lane_lock: LaneLock::Free,
        ..healthy()
    };

    let analysis = analyze_recovery(&ctx);

    assert!(analysis.has_issues);
    assert_eq!(codes(&analysis), vec![IssueCode::OrphanClaim]);
    let reset = analysis.action(ActionKind::Reset).unwrap();
    assert!(!reset.requires_force);
    assert_eq!(reset.warning, None);
}

#[test]
fn orphan_reset_guards_unmerged_branch() {
    let ctx = RecoveryContext { worktree_exists: false, ..healthy() };

    let reset = analyze_recovery(&ctx).action(ActionKind::Reset).cloned().unwrap();

    assert!(reset.requires_force);
    assert!(reset.warning.unwrap().contains("lane/core/wu-5"));
}

#[parameterized(
    in_progress = { WuStatus::InProgress },
    blocked = { WuStatus::Blocked },
    ready = { WuStatus::Ready },
)]
fn merged_work_without_done_is_merged_not_done(status: WuStatus) {
    let ctx = RecoveryContext {
        status: Some(status),
        worktree_exists: false,
        branch_exists: false,
        merged: true,
        ..healthy()
    };

    let analysis = analyze_recovery(&ctx);

    assert!(analysis.has(IssueCode::MergedNotDone));
    assert_eq!(kinds(&analysis), vec![ActionKind::Complete]);
    let complete = analysis.action(ActionKind::Complete).unwrap();
    assert_eq!(complete.command, "lk recover run --wu WU-5 --action complete");
}

#[test]
fn orphan_claim_is_reported_whatever_the_merge_state() {
    let unmerged =
        RecoveryContext { worktree_exists: false, lane_lock: LaneLock::Free, ..healthy() };
    let merged = RecoveryContext { merged: true, ..unmerged.clone() };

    assert_eq!(kinds(&analyze_recovery(&unmerged)), vec![ActionKind::Reset]);
    assert!(analyze_recovery(&unmerged).has(IssueCode::OrphanClaim));
    assert!(analyze_recovery(&merged).has(IssueCode::OrphanClaim));
}

#[test]
fn cleanup_interrupted_before_branch_deletion_proposes_complete() {
    // Pushed and worktree removed, lane branch still present
    let ctx = RecoveryContext {
        worktree_exists: false,
        merged: true,
        lane_lock: LaneLock::Free,
        ..healthy()
    };

    let analysis = analyze_recovery(&ctx);

    assert_eq!(codes(&analysis), vec![IssueCode::OrphanClaim, IssueCode::MergedNotDone]);
    assert_eq!(kinds(&analysis), vec![ActionKind::Complete]);
    let complete = analysis.action(ActionKind::Complete).unwrap();
    assert!(!complete.requires_force);
    assert!(complete.description.contains("delete the merged lane branch"));
}

#[parameterized(
    done = { WuStatus::Done },
    cancelled = { WuStatus::Cancelled },
)]
fn retired_wu_with_worktree_is_leftover(status: WuStatus) {
    let ctx = RecoveryContext { status: Some(status), lane_lock: LaneLock::Free, ..healthy() };

    let analysis = analyze_recovery(&ctx);

    assert_eq!(codes(&analysis), vec![IssueCode::LeftoverWorktree]);
    assert_eq!(kinds(&analysis), vec![ActionKind::Cleanup]);
}

#[parameterized(
    zombie = { LaneLock::Zombie { owner_id: "WU-5".to_string(), pid: 42 }, true },
    stale = { LaneLock::Stale { owner_id: "WU-5".to_string(), pid: 42, age_secs: 9_000 }, true },
    live = { LaneLock::Held { owner_id: "WU-5".to_string(), pid: 42 }, false },
    other_owner = { LaneLock::Zombie { owner_id: "WU-6".to_string(), pid: 42 }, false },
    free = { LaneLock::Free, false },
)]
fn dead_lane_lock_for_this_wu_is_zombie_lock(lock: LaneLock, expected: bool) {
    let ctx = RecoveryContext { lane_lock: lock, ..healthy() };

    let analysis = analyze_recovery(&ctx);

    assert_eq!(analysis.has(IssueCode::ZombieLock), expected);
    assert_eq!(analysis.action(ActionKind::ReleaseLock).is_some(), expected);
}

#[test]
fn issues_accumulate_and_actions_are_not_repeated() {
    let ctx = RecoveryContext {
        worktree_exists: false,
        branch_exists: false,
        lane_lock: LaneLock::Zombie { owner_id: "WU-5".to_string(), pid: 42 },
        ..healthy()
    };

    let analysis = analyze_recovery(&ctx);

    assert_eq!(codes(&analysis), vec![IssueCode::OrphanClaim, IssueCode::ZombieLock]);
    assert_eq!(kinds(&analysis), vec![ActionKind::Reset, ActionKind::ReleaseLock]);
}

#[test]
fn analysis_serializes_with_camel_case_keys() {
    let ctx = RecoveryContext {
        worktree_exists: false,
        branch_exists: false,
        lane_lock: LaneLock::Free,
        ..healthy()
    };

    let json = serde_json::to_value(analyze_recovery(&ctx)).unwrap();

    assert_eq!(json["hasIssues"], true);
    assert_eq!(json["wuId"], "WU-5");
    assert_eq!(json["issues"][0]["code"], "orphan_claim");
    assert_eq!(json["actions"][0]["type"], "reset");
    assert_eq!(json["actions"][0]["requiresForce"], false);
}

#[parameterized(
    plain = { "reset", Ok(ActionKind::Reset) },
    dashed = { "release-lock", Ok(ActionKind::ReleaseLock) },
    snake = { "release_lock", Ok(ActionKind::ReleaseLock) },
    bogus = { "nuke", Err(UnknownAction("nuke".to_string())) },
)]
fn action_kind_parses(input: &str, expected: Result<ActionKind, UnknownAction>) {
    assert_eq!(input.parse::<ActionKind>(), expected);
}
