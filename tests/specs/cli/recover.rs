//! `lk recover` specs

use crate::prelude::*;

/// WU-1 claimed with a worktree that no longer exists and no lane branch.
fn orphaned(temp: &Project) {
    temp.git_init();
    let gone = temp.state_path().join("worktrees/lane-core-wu-1");
    temp.event(json!({
        "type": "claim", "wuId": "WU-1", "lane": "Core", "title": "Parse lane config",
        "timestamp": "2026-03-01T10:00:00Z",
        "worktreePath": gone, "branch": "lane/core/wu-1",
    }));
}

#[test]
fn analyze_reports_an_orphan_claim() {
    let temp = Project::empty();
    orphaned(&temp);

    temp.lk()
        .args(&["recover", "analyze", "--wu", "WU-1"])
        .passes()
        .stdout_has("WU-1: 1 issue(s)")
        .stdout_has("orphan_claim")
        .stdout_has("lk recover run --wu WU-1 --action reset");
}

#[test]
fn analyze_json_lists_typed_actions() {
    let temp = Project::empty();
    orphaned(&temp);

    let analysis =
        temp.lk().args(&["--format", "json", "recover", "analyze", "--wu", "WU-1"]).passes().json();
    assert_eq!(analysis["hasIssues"], true);
    assert_eq!(analysis["issues"][0]["code"], "orphan_claim");
    assert_eq!(analysis["actions"][0]["type"], "reset");
    assert_eq!(analysis["actions"][0]["requiresForce"], false);
}

#[test]
fn healthy_wu_has_no_issues() {
    let temp = Project::empty();
    temp.git_init();
    temp.create("WU-2", "Docs", "Write the guide");

    temp.lk().args(&["recover", "analyze", "--wu", "WU-2"]).passes().stdout_has("WU-2: no issues");
}

#[test]
fn action_that_was_not_proposed_is_refused() {
    let temp = Project::empty();
    orphaned(&temp);

    temp.lk()
        .args(&["recover", "run", "--wu", "WU-1", "--action", "complete"])
        .fails_with(1)
        .stderr_has("does not apply to WU-1")
        .stderr_has("next: lk recover analyze --wu WU-1");
}

#[test]
fn reset_releases_the_orphaned_claim() {
    let temp = Project::empty();
    orphaned(&temp);

    temp.lk()
        .args(&["recover", "run", "--wu", "WU-1", "--action", "reset"])
        .passes()
        .stdout_has("WU-1 reset applied")
        .stdout_has("recorded release");

    temp.lk().args(&["events", "replay", "--wu", "WU-1"]).passes().stdout_has("ready");
    temp.lk().args(&["recover", "analyze", "--wu", "WU-1"]).passes().stdout_has("no issues");
}

#[test]
fn unknown_action_is_a_usage_error() {
    let temp = Project::empty();
    orphaned(&temp);

    temp.lk()
        .args(&["recover", "run", "--wu", "WU-1", "--action", "explode"])
        .fails_with(2)
        .stderr_has("unknown recovery action");
}
