// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with timeouts.
//!
//! Every external command the core runs is bounded: a hung `git` must not
//! wedge an agent that other agents are waiting on.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Local git operations (branch, worktree, merge, rebase, status).
pub const GIT_LOCAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Git operations that talk to a remote (fetch, push).
pub const GIT_REMOTE_TIMEOUT: Duration = Duration::from_secs(120);

/// Verification gates (tests, lint) run before a WU is committed.
pub const GATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{label}: failed to start: {source}")]
    Spawn {
        label: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{label}: timed out after {}s", .timeout.as_secs())]
    Timeout { label: String, timeout: Duration },
}

/// Run a command to completion, killing it if it outlives `timeout`.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    let child = cmd.output();
    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Spawn { label: label.to_string(), source }),
        Err(_) => {
            tracing::warn!(label, timeout_secs = timeout.as_secs(), "subprocess timed out");
            Err(SubprocessError::Timeout { label: label.to_string(), timeout })
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
