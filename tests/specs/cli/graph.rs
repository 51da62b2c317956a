//! `lk graph` specs

use crate::prelude::*;

const CHAIN: &str = r#"[
  {"id": "WU-1", "blocks": ["WU-2", "WU-3"]},
  {"id": "WU-2", "blocks": ["WU-4"]},
  {"id": "WU-3"},
  {"id": "WU-4"}
]"#;

#[test]
fn acyclic_units_pass_check() {
    let temp = Project::empty();
    let units = temp.file("units.json", CHAIN);

    temp.lk()
        .args(&["graph", "--units", units.to_str().unwrap(), "check"])
        .passes()
        .stdout_has("4 work units, no cycles");
}

#[test]
fn cycle_exits_four_and_names_the_loop() {
    let temp = Project::empty();
    let units = temp.file(
        "units.json",
        r#"[
            {"id": "WU-1", "blocks": ["WU-2"], "blockedBy": ["WU-3"]},
            {"id": "WU-2"},
            {"id": "WU-3", "blockedBy": ["WU-2"]}
        ]"#,
    );

    temp.lk()
        .args(&["graph", "check", "--units", units.to_str().unwrap()])
        .fails_with(4)
        .stderr_has("dependency cycle: WU-1 -> WU-2 -> WU-3 -> WU-1");
}

#[test]
fn order_puts_blockers_first() {
    let temp = Project::empty();
    temp.lk().args(&["graph", "order"]).stdin(CHAIN).passes().stdout_eq("WU-1\nWU-2\nWU-3\nWU-4");
}

#[test]
fn critical_path_follows_the_longest_chain() {
    let temp = Project::empty();
    temp.lk()
        .args(&["graph", "critical"])
        .stdin(CHAIN)
        .passes()
        .stdout_eq("WU-1 -> WU-2 -> WU-4 (3 WUs)");
}

#[test]
fn bottlenecks_rank_by_blocked_count() {
    let temp = Project::empty();
    let ranked =
        temp.lk().args(&["--format", "json", "graph", "bottlenecks"]).stdin(CHAIN).passes().json();
    assert_eq!(ranked, json!([{"id": "WU-1", "score": 2}, {"id": "WU-2", "score": 1}]));

    temp.lk()
        .args(&["graph", "bottlenecks", "--limit", "1"])
        .stdin(CHAIN)
        .passes()
        .stdout_eq("WU-1  blocks 2");
}

#[test]
fn malformed_units_fail() {
    let temp = Project::empty();
    temp.lk().args(&["graph", "order"]).stdin("{").fails_with(1).stderr_has("parsing work units");
}
