//! `lk complete` and `lk merge` specs against a real bare remote

use crate::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// A repo on `main` pushed to a bare `origin`, with WU-1 claimed in a lane
/// worktree that holds one new uncommitted file.
struct Lane {
    temp: Project,
    remote: TempDir,
    _work: TempDir,
    worktree: PathBuf,
}

impl Lane {
    fn claimed(gates: &[&str]) -> Self {
        let temp = Project::empty();
        let remote = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        git_in(remote.path(), &["init", "--quiet", "--bare", "--initial-branch=main"]);

        temp.git_init();
        temp.git(&["remote", "add", "origin", remote.path().to_str().unwrap()]);
        temp.git(&["push", "--quiet", "origin", "main"]);

        let worktree = work.path().join("lane-core-wu-1");
        let path = worktree.to_str().unwrap();
        temp.git(&["worktree", "add", "--quiet", "-b", "lane/core/wu-1", path, "main"]);
        std::fs::write(worktree.join("feature.txt"), "lane work\n").unwrap();

        let gates: Vec<String> = gates.iter().map(|g| format!("{g:?}")).collect();
        temp.file(".lanekeeper.toml", &format!("gates = [{}]\n", gates.join(", ")));

        temp.create("WU-1", "core", "Parse lane config");
        temp.event(json!({
            "type": "claim", "wuId": "WU-1", "lane": "core", "title": "Parse lane config",
            "timestamp": "2026-03-01T10:00:00Z",
            "worktreePath": worktree, "branch": "lane/core/wu-1",
        }));
        Self { temp, remote, _work: work, worktree }
    }

    fn remote_log(&self) -> String {
        git_in(self.remote.path(), &["log", "main", "--format=%s"])
    }
}

#[test]
fn complete_merges_pushes_and_cleans_up() {
    let lane = Lane::claimed(&["test -f feature.txt"]);
    let temp = &lane.temp;

    temp.lk().args(&["complete", "--wu", "WU-1"]).passes().stdout_has("WU-1 done (merged");

    let remote_log = lane.remote_log();
    assert!(remote_log.contains("WU-1: Parse lane config"), "remote log:\n{remote_log}");
    assert!(temp.git(&["log", "main", "--format=%s"]).contains("WU-1: Parse lane config"));
    assert!(!lane.worktree.exists(), "lane worktree removed");
    assert_eq!(temp.git(&["branch", "--list", "lane/core/wu-1"]), "");

    temp.lk().args(&["events", "replay", "--wu", "WU-1"]).passes().stdout_has("done");
    temp.lk().args(&["lock", "list"]).passes().stdout_eq("no locks");
    temp.lk().args(&["recover", "analyze", "--wu", "WU-1"]).passes().stdout_has("no issues");
}

#[test]
fn failed_gate_stops_before_the_trunk_and_resume_finishes() {
    let lane = Lane::claimed(&["test -f missing.txt"]);
    let temp = &lane.temp;

    temp.lk()
        .args(&["complete", "--wu", "WU-1"])
        .fails_with(1)
        .stderr_has("completion of WU-1 failed at gating")
        .stderr_has("next: lk complete --wu WU-1 --resume");
    assert_eq!(lane.remote_log(), "initial commit");

    // The lane stays held for the agent that ran `lk complete`
    let locks = temp.lk().args(&["--format", "json", "lock", "list"]).passes().json();
    assert_eq!(locks[0]["resource"], "lane:core");
    assert_eq!(locks[0]["ownerId"], "WU-1");
    assert_eq!(locks[0]["state"], "held");
    assert_eq!(locks[0]["pid"], std::process::id());

    temp.lk()
        .args(&["complete", "--wu", "WU-1"])
        .fails_with(1)
        .stderr_has("resume it instead of starting over")
        .stderr_has("next: lk complete --wu WU-1 --resume");

    temp.lk()
        .args(&["events", "replay", "--wu", "WU-1"])
        .passes()
        .stdout_has("completion failed at gating");

    std::fs::write(lane.worktree.join("missing.txt"), "now present\n").unwrap();
    temp.lk().args(&["complete", "--wu", "WU-1", "--resume"]).passes().stdout_has("WU-1 done");
    assert!(lane.remote_log().contains("WU-1: Parse lane config"));
}

#[test]
fn prep_passed_skips_gates() {
    let lane = Lane::claimed(&["false"]);
    lane.temp
        .lk()
        .args(&["complete", "--wu", "WU-1", "--prep-passed"])
        .passes()
        .stdout_has("WU-1 done");
}

#[test]
fn ready_wu_cannot_be_completed() {
    let temp = Project::empty();
    temp.git_init();
    temp.create("WU-2", "docs", "Write the guide");

    temp.lk()
        .args(&["complete", "--wu", "WU-2"])
        .fails_with(1)
        .stderr_has("only an in-progress WU can be completed")
        .stderr_has("next: lk recover analyze --wu WU-2");
}

#[test]
fn unknown_wu_has_no_events() {
    let temp = Project::empty();
    temp.git_init();
    temp.lk().args(&["complete", "--wu", "WU-9"]).fails_with(1).stderr_has("WU-9 has no events");
}

#[test]
fn merge_publishes_a_committed_lane_branch() {
    let lane = Lane::claimed(&[]);
    let temp = &lane.temp;
    git_in(&lane.worktree, &["add", "feature.txt"]);
    git_in(&lane.worktree, &["commit", "--quiet", "-m", "WU-1: add feature"]);

    temp.lk().args(&["merge", "--wu", "WU-1"]).passes().stdout_has("WU-1 merged");
    assert!(lane.remote_log().contains("WU-1: add feature"));

    temp.lk().args(&["merge", "--wu", "WU-1"]).passes().stdout_has("WU-1 is already on trunk");
    temp.lk().args(&["lock", "list"]).passes().stdout_eq("no locks");
}
