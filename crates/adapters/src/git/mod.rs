// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git as an external collaborator.
//!
//! The coordination core never parses git internals; it asks narrow
//! questions through [`GitAdapter`]. [`CliGit`] shells out to `git` with
//! bounded timeouts. [`FakeGit`] is an in-memory commit graph for tests.

mod cli;
#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use cli::CliGit;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeGit;

use crate::subprocess::SubprocessError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error(
        "`git {command}` failed ({}): {stderr}",
        .code.map_or("signal".to_string(), |c| format!("exit {c}"))
    )]
    Command { command: String, code: Option<i32>, stderr: String },
    #[error("unknown revision `{0}`")]
    UnknownRevision(String),
    #[error("cannot fast-forward `{branch}` to {target}")]
    NotFastForward { branch: String, target: String },
}

/// Result of pushing a ref to the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    /// The remote refused a non-fast-forward update; someone else pushed first.
    Rejected { reason: String },
}

/// One entry from `git worktree list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub head: String,
    /// `None` for detached worktrees.
    pub branch: Option<String>,
}

/// Narrow git surface used by the merge executor, the completion pipeline,
/// and recovery context probing.
///
/// Revisions are anything `git rev-parse` accepts. Branch arguments are
/// short names (`main`, `lane/core/wu-1`).
#[async_trait]
pub trait GitAdapter: Send + Sync {
    /// Fetch `branch` from `remote` and return the fetched tip.
    async fn fetch(&self, remote: &str, branch: &str) -> Result<String, GitError>;

    /// Resolve a revision to a commit sha. `None` when it does not exist.
    async fn rev_parse(&self, rev: &str) -> Result<Option<String>, GitError>;

    async fn branch_exists(&self, branch: &str) -> Result<bool, GitError>;

    /// Create (or move) `branch` at `start` without checking it out.
    async fn create_branch(&self, branch: &str, start: &str) -> Result<(), GitError>;

    /// Force-delete a local branch. Deleting a missing branch is not an error.
    async fn delete_branch(&self, branch: &str) -> Result<(), GitError>;

    /// Point `refs/heads/<branch>` at `sha`.
    async fn update_ref(&self, branch: &str, sha: &str) -> Result<(), GitError>;

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, GitError>;

    /// Whether any commit reachable from `rev` mentions `needle` in its message.
    async fn log_contains(&self, rev: &str, needle: &str) -> Result<bool, GitError>;

    /// Branch checked out in the main working copy.
    async fn current_branch(&self) -> Result<Option<String>, GitError>;

    /// Fast-forward a local branch to `sha`, whether or not it is checked out.
    async fn fast_forward(&self, branch: &str, sha: &str) -> Result<(), GitError>;

    /// Push `local` to `refs/heads/<remote_branch>` on `remote`.
    async fn push(
        &self,
        remote: &str,
        local: &str,
        remote_branch: &str,
    ) -> Result<PushOutcome, GitError>;

    async fn add_worktree(&self, path: &Path, branch: &str) -> Result<(), GitError>;

    async fn add_detached_worktree(&self, path: &Path, rev: &str) -> Result<(), GitError>;

    /// Remove a worktree and prune its admin entry. Missing paths are pruned.
    async fn remove_worktree(&self, path: &Path) -> Result<(), GitError>;

    async fn worktrees(&self) -> Result<Vec<WorktreeInfo>, GitError>;

    /// Commit checked out in a worktree.
    async fn head(&self, worktree: &Path) -> Result<String, GitError>;

    async fn reset_hard(&self, worktree: &Path, rev: &str) -> Result<(), GitError>;

    /// `git merge --ff-only`. `Ok(false)` when a fast-forward is impossible.
    async fn merge_ff_only(&self, worktree: &Path, rev: &str) -> Result<bool, GitError>;

    /// Rebase what is checked out in `worktree` onto `onto`. On conflict the
    /// rebase is aborted and `Ok(false)` returned.
    async fn rebase(&self, worktree: &Path, onto: &str) -> Result<bool, GitError>;

    /// Paths with uncommitted changes (`git status --porcelain`).
    async fn uncommitted_changes(&self, worktree: &Path) -> Result<Vec<String>, GitError>;

    /// Stage everything and commit. `Ok(false)` when there was nothing to commit.
    async fn commit_all(&self, worktree: &Path, message: &str) -> Result<bool, GitError>;
}
