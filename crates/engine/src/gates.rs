// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verification gates run in a WU worktree before its work is committed.

use async_trait::async_trait;
use lk_adapters::subprocess::{run_with_timeout, GATE_TIMEOUT};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("gate `{command}` failed (exit {exit_code}){}", fmt_stderr(.stderr))]
    Failed { command: String, exit_code: i32, stderr: String },
    #[error("gate `{command}` execution error: {message}")]
    Execution { command: String, message: String },
}

fn fmt_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Runs the configured verification for a worktree.
#[async_trait]
pub trait GateRunner: Send + Sync {
    async fn run(&self, worktree: &Path) -> Result<(), GateError>;
}

/// Shell commands run in order with `sh -c`; the first failure stops the run.
#[derive(Debug, Clone, Default)]
pub struct ShellGates {
    commands: Vec<String>,
}

impl ShellGates {
    pub fn new(commands: Vec<String>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl GateRunner for ShellGates {
    async fn run(&self, worktree: &Path) -> Result<(), GateError> {
        for command in &self.commands {
            tracing::info!(%command, worktree = %worktree.display(), "running gate");
            run_gate_command(command, worktree).await?;
        }
        Ok(())
    }
}

/// Run one shell gate command. Exit code 0 passes.
pub async fn run_gate_command(command: &str, cwd: &Path) -> Result<(), GateError> {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(cwd);

    match run_with_timeout(cmd, GATE_TIMEOUT, "gate command").await {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => Err(GateError::Failed {
            command: command.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
        Err(e) => {
            Err(GateError::Execution { command: command.to_string(), message: e.to_string() })
        }
    }
}

#[cfg(test)]
#[path = "gates_tests.rs"]
mod tests;
