//! `lk lock` specs

use crate::prelude::*;

#[test]
fn acquire_then_list_shows_the_holder() {
    let temp = Project::empty();
    temp.lk()
        .args(&["lock", "acquire", "lane:core", "--owner", "WU-1"])
        .passes()
        .stdout_has("lane:core acquired");

    temp.lk()
        .args(&["lock", "list"])
        .passes()
        .stdout_has("RESOURCE")
        .stdout_has("lane:core")
        .stdout_has("held")
        .stdout_has("WU-1");
}

#[test]
fn list_with_no_locks() {
    let temp = Project::empty();
    temp.lk().args(&["lock", "list"]).passes().stdout_eq("no locks");
}

#[test]
fn reacquire_by_the_same_owner_is_reentrant() {
    let temp = Project::empty();
    temp.lk().args(&["lock", "acquire", "merge", "--owner", "WU-1"]).passes();
    let again = temp
        .lk()
        .args(&["--format", "json", "lock", "acquire", "merge", "--owner", "WU-1"])
        .passes()
        .json();
    assert_eq!(again["reentrant"], true);
}

#[test]
fn contended_lock_exits_three_with_a_next_step() {
    let temp = Project::empty();
    temp.lk().args(&["lock", "acquire", "merge", "--owner", "WU-1"]).passes();

    temp.lk()
        .args(&["lock", "acquire", "merge", "--owner", "WU-2", "--wait-ms", "0"])
        .fails_with(3)
        .stderr_has("merge is held by WU-1")
        .stderr_has("next: lk lock list");
}

#[test]
fn release_needs_the_matching_lock_id() {
    let temp = Project::empty();
    let acquired = temp
        .lk()
        .args(&["--format", "json", "lock", "acquire", "state:events", "--owner", "WU-1"])
        .passes()
        .json();
    let lock_id = acquired["lockId"].as_str().unwrap().to_string();

    temp.lk()
        .args(&["lock", "release", "state:events", "--lock-id", "not-the-id"])
        .passes()
        .stdout_has("nothing released");
    temp.lk()
        .args(&["lock", "release", "state:events", "--lock-id", &lock_id])
        .passes()
        .stdout_has("released state:events");
    temp.lk().args(&["lock", "list"]).passes().stdout_eq("no locks");
}

#[test]
fn unlock_of_a_live_lock_needs_force() {
    let temp = Project::empty();
    temp.lk().args(&["lock", "acquire", "cleanup", "--owner", "WU-4"]).passes();

    temp.lk()
        .args(&["lock", "unlock", "cleanup"])
        .fails_with(3)
        .stderr_has("next: lk lock unlock cleanup --force");
    temp.lk()
        .args(&["lock", "unlock", "cleanup", "--force"])
        .passes()
        .stdout_has("unlocked cleanup (was held by WU-4)");
}

#[test]
fn dead_holder_shows_as_zombie_and_unlocks_without_force() {
    let temp = Project::empty();
    let pid = dead_pid().to_string();
    temp.lk().args(&["lock", "acquire", "lane:docs", "--owner", "WU-9", "--pid", &pid]).passes();

    let rows = temp.lk().args(&["--format", "json", "lock", "list"]).passes().json();
    assert_eq!(rows[0]["state"], "zombie");
    assert_eq!(rows[0]["ownerId"], "WU-9");

    temp.lk().args(&["lock", "unlock", "lane:docs"]).passes().stdout_has("was held by WU-9");
}

#[test]
fn zombie_lock_is_taken_over_by_a_new_owner() {
    let temp = Project::empty();
    let pid = dead_pid().to_string();
    temp.lk().args(&["lock", "acquire", "merge", "--owner", "WU-1", "--pid", &pid]).passes();

    temp.lk().args(&["lock", "acquire", "merge", "--owner", "WU-2", "--wait-ms", "0"]).passes();
    temp.lk().args(&["lock", "list"]).passes().stdout_has("WU-2").stdout_lacks("WU-1");
}
