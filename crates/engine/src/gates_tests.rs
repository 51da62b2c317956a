// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    success = { "true", None },
    exit_code = { "exit 3", Some((3, "")) },
    stderr = { "echo broken >&2; exit 1", Some((1, "broken")) },
)]
#[test_macro(tokio::test)]
async fn gate_command_results(command: &str, expected: Option<(i32, &str)>) {
    let dir = tempfile::tempdir().unwrap();
    let result = run_gate_command(command, dir.path()).await;
    match expected {
        None => assert_eq!(result, Ok(())),
        Some((code, stderr)) => assert_eq!(
            result,
            Err(GateError::Failed {
                command: command.to_string(),
                exit_code: code,
                stderr: stderr.to_string(),
            })
        ),
    }
}

#[test]
fn failure_message_includes_stderr_only_when_present() {
    let bare = GateError::Failed { command: "make".into(), exit_code: 2, stderr: String::new() };
    assert_eq!(bare.to_string(), "gate `make` failed (exit 2)");
    let noisy =
        GateError::Failed { command: "make".into(), exit_code: 2, stderr: "no rule".into() };
    assert_eq!(noisy.to_string(), "gate `make` failed (exit 2): no rule");
}

#[tokio::test]
async fn shell_gates_run_in_worktree_and_stop_at_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let gates = ShellGates::new(vec![
        "touch first".to_string(),
        "exit 7".to_string(),
        "touch third".to_string(),
    ]);

    let err = gates.run(dir.path()).await.unwrap_err();

    assert!(matches!(err, GateError::Failed { exit_code: 7, .. }));
    assert!(dir.path().join("first").exists());
    assert!(!dir.path().join("third").exists());
}

#[tokio::test]
async fn no_gates_pass() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(ShellGates::default().run(dir.path()).await, Ok(()));
}
