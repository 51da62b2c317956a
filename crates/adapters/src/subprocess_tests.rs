// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn captures_output_of_finished_command() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo hello; echo oops >&2; exit 3"]);

    let output = run_with_timeout(cmd, Duration::from_secs(10), "sh").await.unwrap();

    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "oops");
    assert_eq!(output.status.code(), Some(3));
}

#[tokio::test]
async fn slow_command_times_out() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");

    let err = run_with_timeout(cmd, Duration::from_millis(100), "sleep").await.unwrap_err();

    assert!(matches!(err, SubprocessError::Timeout { .. }));
    assert_eq!(err.to_string(), "sleep: timed out after 0s");
}

#[tokio::test]
async fn missing_binary_is_spawn_error() {
    let cmd = Command::new("lk-definitely-not-a-real-binary");
    let err = run_with_timeout(cmd, Duration::from_secs(1), "ghost").await.unwrap_err();
    assert!(matches!(err, SubprocessError::Spawn { .. }));
}
