//! `lk spawn` specs

use crate::prelude::*;

fn register(temp: &Project, target: &str) -> String {
    let record = temp
        .lk()
        .args(&["--format", "json", "spawn", "register", "--parent", "WU-1", "--target", target])
        .args(&["--lane", "core"])
        .passes()
        .json();
    assert_eq!(record["status"], "pending");
    record["id"].as_str().unwrap().to_string()
}

#[test]
fn registered_spawn_is_listed_as_pending() {
    let temp = Project::empty();
    let id = register(&temp, "WU-2");

    temp.lk()
        .args(&["spawn", "list", "--pending"])
        .passes()
        .stdout_has(&id)
        .stdout_has("pending")
        .stdout_has("WU-2");
}

#[test]
fn finished_spawn_leaves_the_pending_list() {
    let temp = Project::empty();
    let id = register(&temp, "WU-2");

    temp.lk().args(&["spawn", "finish", &id]).passes().stdout_has("is completed");
    temp.lk().args(&["spawn", "list", "--pending"]).passes().stdout_eq("no spawns");
    temp.lk().args(&["spawn", "list"]).passes().stdout_has("completed");
}

#[test]
fn finishing_twice_is_refused() {
    let temp = Project::empty();
    let id = register(&temp, "WU-2");
    temp.lk().args(&["spawn", "finish", &id, "--status", "crashed"]).passes();

    temp.lk().args(&["spawn", "finish", &id]).fails_with(1).stderr_has("next: lk spawn list");
}

#[test]
fn unknown_spawn_points_at_the_list() {
    let temp = Project::empty();
    temp.lk()
        .args(&["spawn", "recover", "spawn-nope"])
        .fails_with(1)
        .stderr_has("next: lk spawn list");
}

#[test]
fn sweep_with_nothing_pending() {
    let temp = Project::empty();
    temp.lk().args(&["spawn", "sweep"]).passes().stdout_eq("no pending spawns");
}

#[test]
fn spawn_without_a_lock_is_healthy() {
    let temp = Project::empty();
    let id = register(&temp, "WU-2");

    temp.lk()
        .args(&["spawn", "recover", &id])
        .passes()
        .stdout_has("none")
        .stdout_has("no lock held on lane:core");
}

#[test]
fn sweep_releases_the_lock_of_a_dead_sub_agent() {
    let temp = Project::empty();
    let id = register(&temp, "WU-2");
    let pid = dead_pid().to_string();
    temp.lk().args(&["lock", "acquire", "lane:core", "--owner", "WU-2", "--pid", &pid]).passes();

    let recoveries = temp.lk().args(&["--format", "json", "spawn", "sweep"]).passes().json();
    assert_eq!(recoveries[0]["spawnId"], id.as_str());
    assert_eq!(recoveries[0]["action"], "released_zombie");
    assert_eq!(recoveries[0]["recovered"], true);
    let audit = recoveries[0]["auditPath"].as_str().unwrap();
    assert!(std::path::Path::new(audit).exists(), "audit record written at {audit}");

    temp.lk().args(&["lock", "list"]).passes().stdout_eq("no locks");
    temp.lk().args(&["spawn", "list"]).passes().stdout_has("crashed");
}

#[test]
fn lane_held_by_another_wu_is_left_alone() {
    let temp = Project::empty();
    let id = register(&temp, "WU-2");
    let pid = dead_pid().to_string();
    temp.lk().args(&["lock", "acquire", "lane:core", "--owner", "WU-5", "--pid", &pid]).passes();

    temp.lk().args(&["spawn", "recover", &id]).passes().stdout_has("held by WU-5, not WU-2");
    temp.lk().args(&["lock", "list"]).passes().stdout_has("WU-5");
}
