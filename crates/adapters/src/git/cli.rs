// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`GitAdapter`] backed by the `git` binary.

use super::{GitAdapter, GitError, PushOutcome, WorktreeInfo};
use crate::subprocess::{run_with_timeout, GIT_LOCAL_TIMEOUT, GIT_REMOTE_TIMEOUT};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Runs `git -C <dir>` against one repository.
#[derive(Debug, Clone)]
pub struct CliGit {
    repo: PathBuf,
}

impl CliGit {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn command(dir: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(dir)
            .args(args)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    async fn output_in(
        &self,
        dir: &Path,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output, GitError> {
        let label = format!("git {}", args.first().copied().unwrap_or_default());
        Ok(run_with_timeout(Self::command(dir, args), timeout, &label).await?)
    }

    /// Run and require success; returns trimmed stdout.
    async fn run_in(
        &self,
        dir: &Path,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, GitError> {
        let output = self.output_in(dir, args, timeout).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(command_error(args, &output))
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        self.run_in(&self.repo, args, GIT_LOCAL_TIMEOUT).await
    }

    /// Run where a non-zero exit is an answer (`false`) rather than a failure.
    async fn check(&self, dir: &Path, args: &[&str]) -> Result<bool, GitError> {
        let output = self.output_in(dir, args, GIT_LOCAL_TIMEOUT).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_error(args, &output)),
        }
    }
}

fn command_error(args: &[&str], output: &Output) -> GitError {
    GitError::Command {
        command: args.join(" "),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[async_trait]
impl GitAdapter for CliGit {
    async fn fetch(&self, remote: &str, branch: &str) -> Result<String, GitError> {
        self.run_in(&self.repo, &["fetch", "--quiet", remote, branch], GIT_REMOTE_TIMEOUT).await?;
        let tracking = format!("refs/remotes/{remote}/{branch}");
        self.rev_parse(&tracking).await?.ok_or(GitError::UnknownRevision(tracking))
    }

    async fn rev_parse(&self, rev: &str) -> Result<Option<String>, GitError> {
        let spec = format!("{rev}^{{commit}}");
        let args = ["rev-parse", "--verify", "--quiet", spec.as_str()];
        let output = self.output_in(&self.repo, &args, GIT_LOCAL_TIMEOUT).await?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(None)
        }
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, GitError> {
        let refname = format!("refs/heads/{branch}");
        let args = ["show-ref", "--verify", "--quiet", refname.as_str()];
        let output = self.output_in(&self.repo, &args, GIT_LOCAL_TIMEOUT).await?;
        Ok(output.status.success())
    }

    async fn create_branch(&self, branch: &str, start: &str) -> Result<(), GitError> {
        self.run(&["branch", "--force", "--no-track", branch, start]).await.map(drop)
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), GitError> {
        if !self.branch_exists(branch).await? {
            return Ok(());
        }
        self.run(&["branch", "-D", branch]).await.map(drop)
    }

    async fn update_ref(&self, branch: &str, sha: &str) -> Result<(), GitError> {
        let refname = format!("refs/heads/{branch}");
        self.run(&["update-ref", &refname, sha]).await.map(drop)
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, GitError> {
        self.check(&self.repo, &["merge-base", "--is-ancestor", ancestor, descendant]).await
    }

    async fn log_contains(&self, rev: &str, needle: &str) -> Result<bool, GitError> {
        let grep = format!("--grep={needle}");
        let out = self
            .run(&["log", "--fixed-strings", "--format=%H", "-n", "1", &grep, rev])
            .await?;
        Ok(!out.is_empty())
    }

    async fn current_branch(&self) -> Result<Option<String>, GitError> {
        let args = ["symbolic-ref", "--quiet", "--short", "HEAD"];
        let output = self.output_in(&self.repo, &args, GIT_LOCAL_TIMEOUT).await?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(None)
        }
    }

    async fn fast_forward(&self, branch: &str, sha: &str) -> Result<(), GitError> {
        if self.current_branch().await?.as_deref() == Some(branch) {
            return self.run(&["merge", "--ff-only", "--quiet", sha]).await.map(drop);
        }
        if self.branch_exists(branch).await? && !self.is_ancestor(branch, sha).await? {
            return Err(GitError::NotFastForward {
                branch: branch.to_string(),
                target: sha.to_string(),
            });
        }
        self.update_ref(branch, sha).await
    }

    async fn push(
        &self,
        remote: &str,
        local: &str,
        remote_branch: &str,
    ) -> Result<PushOutcome, GitError> {
        let refspec = format!("{local}:refs/heads/{remote_branch}");
        let args = ["push", "--porcelain", remote, refspec.as_str()];
        let output = self.output_in(&self.repo, &args, GIT_REMOTE_TIMEOUT).await?;
        if output.status.success() {
            return Ok(PushOutcome::Pushed);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let rejected = stdout.lines().any(|l| l.starts_with('!'))
            || stderr.contains("non-fast-forward")
            || stderr.contains("fetch first");
        if rejected {
            Ok(PushOutcome::Rejected { reason: stderr.trim().to_string() })
        } else {
            Err(command_error(&args, &output))
        }
    }

    async fn add_worktree(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(
                    path = %parent.display(),
                    error = %e,
                    "failed to create worktree parent"
                );
            }
        }
        self.run(&["worktree", "add", "--quiet", &path_arg(path), branch]).await.map(drop)
    }

    async fn add_detached_worktree(&self, path: &Path, rev: &str) -> Result<(), GitError> {
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(
                    path = %parent.display(),
                    error = %e,
                    "failed to create worktree parent"
                );
            }
        }
        self.run(&["worktree", "add", "--quiet", "--detach", &path_arg(path), rev]).await.map(drop)
    }

    async fn remove_worktree(&self, path: &Path) -> Result<(), GitError> {
        if path.exists() {
            self.run(&["worktree", "remove", "--force", &path_arg(path)]).await?;
        }
        self.run(&["worktree", "prune"]).await.map(drop)
    }

    async fn worktrees(&self) -> Result<Vec<WorktreeInfo>, GitError> {
        let out = self.run(&["worktree", "list", "--porcelain"]).await?;
        Ok(parse_worktree_list(&out))
    }

    async fn head(&self, worktree: &Path) -> Result<String, GitError> {
        self.run_in(worktree, &["rev-parse", "HEAD"], GIT_LOCAL_TIMEOUT).await
    }

    async fn reset_hard(&self, worktree: &Path, rev: &str) -> Result<(), GitError> {
        self.run_in(worktree, &["reset", "--hard", "--quiet", rev], GIT_LOCAL_TIMEOUT)
            .await
            .map(drop)
    }

    async fn merge_ff_only(&self, worktree: &Path, rev: &str) -> Result<bool, GitError> {
        let args = ["merge", "--ff-only", "--quiet", rev];
        let output = self.output_in(worktree, &args, GIT_LOCAL_TIMEOUT).await?;
        Ok(output.status.success())
    }

    async fn rebase(&self, worktree: &Path, onto: &str) -> Result<bool, GitError> {
        let output =
            self.output_in(worktree, &["rebase", "--quiet", onto], GIT_LOCAL_TIMEOUT).await?;
        if output.status.success() {
            return Ok(true);
        }
        tracing::debug!(
            worktree = %worktree.display(),
            onto,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "rebase failed, aborting"
        );
        let abort = ["rebase", "--abort"];
        let aborted = self.output_in(worktree, &abort, GIT_LOCAL_TIMEOUT).await?;
        if !aborted.status.success() {
            tracing::warn!(
                worktree = %worktree.display(),
                "rebase --abort failed, worktree left mid-rebase"
            );
            return Err(command_error(&abort, &aborted));
        }
        Ok(false)
    }

    async fn uncommitted_changes(&self, worktree: &Path) -> Result<Vec<String>, GitError> {
        let args = ["status", "--porcelain"];
        let output = self.output_in(worktree, &args, GIT_LOCAL_TIMEOUT).await?;
        if !output.status.success() {
            return Err(command_error(&args, &output));
        }
        // Not trimmed: the two status columns may start with a space
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(|l| l.get(3..)).map(str::to_string).collect())
    }

    async fn commit_all(&self, worktree: &Path, message: &str) -> Result<bool, GitError> {
        self.run_in(worktree, &["add", "--all"], GIT_LOCAL_TIMEOUT).await?;
        let staged = self.check(worktree, &["diff", "--cached", "--quiet"]).await?;
        if staged {
            // exit 0 from `diff --quiet` means no differences
            return Ok(false);
        }
        self.run_in(worktree, &["commit", "--quiet", "-m", message], GIT_LOCAL_TIMEOUT).await?;
        Ok(true)
    }
}

/// Parse `git worktree list --porcelain` output.
fn parse_worktree_list(out: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    for block in out.split("\n\n") {
        let mut path = None;
        let mut head = String::new();
        let mut branch = None;
        for line in block.lines() {
            if let Some(p) = line.strip_prefix("worktree ") {
                path = Some(PathBuf::from(p));
            } else if let Some(h) = line.strip_prefix("HEAD ") {
                head = h.to_string();
            } else if let Some(b) = line.strip_prefix("branch ") {
                branch = Some(b.strip_prefix("refs/heads/").unwrap_or(b).to_string());
            }
        }
        if let Some(path) = path {
            worktrees.push(WorktreeInfo { path, head, branch });
        }
    }
    worktrees
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
