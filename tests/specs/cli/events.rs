//! `lk events` specs

use crate::prelude::*;

fn claim(wu: &str) -> serde_json::Value {
    json!({
        "type": "claim", "wuId": wu, "lane": "Core", "title": "Parse lane config",
        "timestamp": "2026-03-01T10:00:00Z",
    })
}

#[test]
fn appended_events_replay_into_status() {
    let temp = Project::empty();
    temp.create("WU-1", "Core", "Parse lane config");
    temp.create("WU-2", "Docs", "Write the guide");
    temp.event(claim("WU-1"));

    temp.lk()
        .args(&["events", "replay"])
        .passes()
        .stdout_has("ID")
        .stdout_has("WU-1  in_progress")
        .stdout_has("WU-2  ready");
}

#[test]
fn append_reports_the_event() {
    let temp = Project::empty();
    temp.lk()
        .args(&["events", "append", &claim("WU-7").to_string()])
        .passes()
        .stdout_has("appended claim for WU-7");
}

#[test]
fn append_reads_stdin() {
    let temp = Project::empty();
    temp.lk().args(&["events", "append", "-"]).stdin(claim("WU-3").to_string()).passes();
    temp.lk().args(&["events", "replay", "--wu", "WU-3"]).passes().stdout_has("in_progress");
}

#[test]
fn block_and_checkpoint_show_under_the_table() {
    let temp = Project::empty();
    temp.event(claim("WU-1"));
    temp.event(json!({
        "type": "block", "wuId": "WU-1", "reason": "waiting on WU-4",
        "timestamp": "2026-03-01T10:05:00Z",
    }));
    temp.event(json!({
        "type": "checkpoint", "wuId": "WU-1", "note": "parser half done",
        "nextSteps": "finish the error paths", "timestamp": "2026-03-01T10:06:00Z",
    }));

    temp.lk()
        .args(&["events", "replay"])
        .passes()
        .stdout_has("blocked")
        .stdout_has("WU-1 blocked: waiting on WU-4")
        .stdout_has("WU-1 checkpoint: parser half done")
        .stdout_has("next: finish the error paths");
}

#[test]
fn release_returns_the_wu_to_ready() {
    let temp = Project::empty();
    temp.event(claim("WU-1"));
    temp.event(json!({
        "type": "release", "wuId": "WU-1", "reason": "agent gave up",
        "timestamp": "2026-03-01T11:00:00Z",
    }));

    let entries =
        temp.lk().args(&["--format", "json", "events", "replay", "--wu", "WU-1"]).passes().json();
    assert_eq!(entries[0]["status"], "ready");
    assert_eq!(entries[0]["lane"], "Core");
}

#[test]
fn invalid_event_is_rejected_and_not_written() {
    let temp = Project::empty();
    let bad = json!({
        "type": "claim", "wuId": "task-1", "lane": "Core", "title": "x",
        "timestamp": "2026-03-01T10:00:00Z",
    });
    temp.lk().args(&["events", "append", &bad.to_string()]).fails_with(1).stderr_has("wuId");
    assert!(!temp.state_path().join("wu-events.jsonl").exists());
}

#[test]
fn bad_timestamp_is_rejected() {
    let temp = Project::empty();
    let bad = json!({ "type": "complete", "wuId": "WU-1", "timestamp": "yesterday" });
    temp.lk().args(&["events", "append", &bad.to_string()]).fails_with(1).stderr_has("timestamp");
}

#[test]
fn corrupt_log_reports_the_line() {
    let temp = Project::empty();
    temp.event(claim("WU-1"));
    let log = temp.state_path().join("wu-events.jsonl");
    let mut text = std::fs::read_to_string(&log).unwrap();
    text.push_str("{not json\n");
    std::fs::write(&log, text).unwrap();

    temp.lk().args(&["events", "replay"]).fails_with(1).stderr_has("corrupt at line 2");
}

#[test]
fn unknown_wu_fails() {
    let temp = Project::empty();
    temp.event(claim("WU-1"));
    temp.lk()
        .args(&["events", "replay", "--wu", "WU-404"])
        .fails_with(1)
        .stderr_has("WU-404 has no events");
}

#[test]
fn empty_log_has_no_work_units() {
    let temp = Project::empty();
    temp.lk().args(&["events", "replay"]).passes().stdout_eq("no work units");
}
