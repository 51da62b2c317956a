// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic merge of a lane branch into the shared trunk.
//!
//! All integration work happens on a temporary branch checked out in a
//! temporary worktree under the scratch directory. The remote trunk is only
//! written by the final push, and that push is a fast-forward of exactly
//! the lane's commits; every earlier failure leaves the trunk untouched.
//! Temporary artifacts are removed on every exit path.

use lk_adapters::{GitAdapter, GitError, PushOutcome};
use lk_core::WuId;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct MergePolicy {
    pub remote: String,
    pub trunk: String,
    /// Merge attempts (fetch, merge, push) before giving up.
    pub retries: u32,
    /// Push tries per attempt for transport failures.
    pub push_retries: u32,
    /// First push backoff; doubles on each retry.
    pub push_backoff: Duration,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            trunk: "main".to_string(),
            retries: 3,
            push_retries: 3,
            push_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub wu_id: WuId,
    pub lane_branch: String,
    /// Worktree where the lane branch is checked out. Rebases happen there
    /// when set; otherwise in a detached scratch worktree.
    pub lane_worktree: Option<PathBuf>,
    /// Overrides [`MergePolicy::retries`].
    pub retries: Option<u32>,
}

impl MergeRequest {
    pub fn new(wu_id: WuId, lane_branch: impl Into<String>) -> Self {
        Self { wu_id, lane_branch: lane_branch.into(), lane_worktree: None, retries: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub wu_id: WuId,
    pub temp_branch_name: String,
    pub worktree_path: PathBuf,
    /// Remote trunk tip seen by the first fetch.
    pub trunk_before: String,
    /// Remote trunk tip once the merge is published.
    pub merged_sha: String,
    pub attempts: u32,
    /// The lane was already reachable from trunk; nothing was pushed.
    pub already_merged: bool,
    pub local_trunk_updated: bool,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("merge needs at least one attempt")]
    NoAttempts,
    #[error("lane branch `{0}` does not exist")]
    UnknownBranch(String),
    #[error("merge for {0} was published before it was prepared")]
    NotPrepared(WuId),
    #[error(
        "{remote}/{trunk} kept moving during all {attempts} merge attempts for {wu_id}; \
         the trunk was not modified. Re-run `lk merge --wu {wu_id}`"
    )]
    TrunkMovedTooFast { wu_id: WuId, remote: String, trunk: String, attempts: u32 },
    #[error(
        "could not merge `{lane_branch}` into {remote}/{trunk} after {attempts} attempt(s): \
         {reason}; the trunk was not modified. Rebase `{lane_branch}` onto {remote}/{trunk}, \
         resolve conflicts, and re-run `lk merge --wu {wu_id}`"
    )]
    MergeFailed {
        wu_id: WuId,
        lane_branch: String,
        remote: String,
        trunk: String,
        attempts: u32,
        reason: String,
    },
    #[error(
        "push to {remote}/{trunk} failed {tries} time(s): {source}; \
         re-run `lk merge --wu {wu_id}`"
    )]
    PushFailed {
        wu_id: WuId,
        remote: String,
        trunk: String,
        tries: u32,
        #[source]
        source: GitError,
    },
    #[error(transparent)]
    Git(#[from] GitError),
}

impl lk_core::Remediation for MergeError {
    fn next_step(&self) -> Option<String> {
        match self {
            MergeError::TrunkMovedTooFast { wu_id, .. }
            | MergeError::MergeFailed { wu_id, .. }
            | MergeError::PushFailed { wu_id, .. }
            | MergeError::NotPrepared(wu_id) => Some(format!("lk merge --wu {wu_id}")),
            MergeError::NoAttempts | MergeError::UnknownBranch(_) | MergeError::Git(_) => None,
        }
    }
}

/// Temporary branch and worktree for one merge run.
#[derive(Debug, Clone)]
struct Scratch {
    branch: String,
    worktree: PathBuf,
    rebase_worktree: PathBuf,
}

impl Scratch {
    fn new(wu_id: &WuId, root: &Path) -> Self {
        let tag = format!(
            "{}-{}",
            wu_id.as_str().to_ascii_lowercase(),
            lk_core::id::token(8)
        );
        Self {
            branch: format!("lk/merge/{tag}"),
            worktree: root.join(format!("merge-{tag}")),
            rebase_worktree: root.join(format!("rebase-{tag}")),
        }
    }
}

/// A prepared merge: the scratch branch holds the fetched trunk plus the
/// lane commits and is ready to publish.
///
/// Call [`MergeWorkspace::cleanup`] once done with it, whether or not
/// publishing succeeded.
pub struct MergeWorkspace {
    git: Arc<dyn GitAdapter>,
    req: MergeRequest,
    retries: u32,
    scratch: Scratch,
    worktree_ready: bool,
    attempts: u32,
    /// Distinct remote tips seen by fetches, in order.
    tips: Vec<String>,
    merged: Option<String>,
    already_merged: bool,
    reason: String,
}

impl MergeWorkspace {
    pub fn wu_id(&self) -> &WuId {
        &self.req.wu_id
    }

    pub fn temp_branch_name(&self) -> &str {
        &self.scratch.branch
    }

    pub fn worktree_path(&self) -> &Path {
        &self.scratch.worktree
    }

    /// Commit that publishing will make the remote trunk tip.
    pub fn merged_sha(&self) -> Option<&str> {
        self.merged.as_deref()
    }

    pub fn already_merged(&self) -> bool {
        self.already_merged
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn outcome(&self, merged_sha: String, local_trunk_updated: bool) -> MergeOutcome {
        MergeOutcome {
            wu_id: self.req.wu_id.clone(),
            temp_branch_name: self.scratch.branch.clone(),
            worktree_path: self.scratch.worktree.clone(),
            trunk_before: self.tips.first().cloned().unwrap_or_default(),
            merged_sha,
            attempts: self.attempts,
            already_merged: self.already_merged,
            local_trunk_updated,
        }
    }

    /// Remove the scratch worktree and branch. Failures are logged.
    pub async fn cleanup(self) {
        let Scratch { branch, worktree, .. } = &self.scratch;
        if let Err(e) = self.git.remove_worktree(worktree).await {
            warn!(path = %worktree.display(), error = %e, "failed to remove merge worktree");
        }
        if let Err(e) = self.git.delete_branch(branch).await {
            warn!(%branch, error = %e, "failed to delete merge branch");
        }
    }
}

pub struct MergeExecutor {
    git: Arc<dyn GitAdapter>,
    policy: MergePolicy,
    scratch_dir: PathBuf,
}

impl MergeExecutor {
    pub fn new(
        git: Arc<dyn GitAdapter>,
        policy: MergePolicy,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { git, policy, scratch_dir: scratch_dir.into() }
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    /// Integrate `req.lane_branch` into the remote trunk: [`prepare`],
    /// [`publish`], then cleanup on every path.
    ///
    /// Safe to re-run: a lane already reachable from trunk returns
    /// `already_merged` without pushing.
    ///
    /// [`prepare`]: MergeExecutor::prepare
    /// [`publish`]: MergeExecutor::publish
    pub async fn atomic_merge(&self, req: &MergeRequest) -> Result<MergeOutcome, MergeError> {
        let mut workspace = self.prepare(req).await?;
        let result = self.publish(&mut workspace).await;
        workspace.cleanup().await;
        match &result {
            Ok(outcome) => info!(
                wu_id = %req.wu_id,
                trunk = %outcome.merged_sha,
                attempts = outcome.attempts,
                already_merged = outcome.already_merged,
                "atomic merge finished"
            ),
            Err(e) => warn!(wu_id = %req.wu_id, error = %e, "atomic merge failed"),
        }
        result
    }

    /// Fetch the trunk and build trunk plus lane on a scratch branch.
    /// Nothing outside the scratch branch and worktree is written, except
    /// the lane branch itself when it has to be rebased.
    pub async fn prepare(&self, req: &MergeRequest) -> Result<MergeWorkspace, MergeError> {
        let retries = req.retries.unwrap_or(self.policy.retries);
        if retries == 0 {
            return Err(MergeError::NoAttempts);
        }
        if !self.git.branch_exists(&req.lane_branch).await? {
            return Err(MergeError::UnknownBranch(req.lane_branch.clone()));
        }

        let mut workspace = MergeWorkspace {
            git: Arc::clone(&self.git),
            req: req.clone(),
            retries,
            scratch: Scratch::new(&req.wu_id, &self.scratch_dir),
            worktree_ready: false,
            attempts: 0,
            tips: Vec::new(),
            merged: None,
            already_merged: false,
            reason: String::new(),
        };
        info!(
            wu_id = %req.wu_id,
            lane_branch = %req.lane_branch,
            temp_branch = %workspace.scratch.branch,
            retries,
            "preparing merge"
        );
        match self.integrate(&mut workspace).await {
            Ok(()) => Ok(workspace),
            Err(e) => {
                workspace.cleanup().await;
                Err(e)
            }
        }
    }

    /// Push the prepared scratch branch to the remote trunk and fast-forward
    /// the local trunk. A rejected push spends another merge attempt on a
    /// fresh fetch before pushing again.
    pub async fn publish(
        &self,
        workspace: &mut MergeWorkspace,
    ) -> Result<MergeOutcome, MergeError> {
        let trunk = &self.policy.trunk;
        loop {
            let merged = workspace
                .merged
                .clone()
                .ok_or_else(|| MergeError::NotPrepared(workspace.req.wu_id.clone()))?;
            if workspace.already_merged {
                return Ok(workspace.outcome(merged, false));
            }
            match self.push_with_backoff(workspace).await? {
                PushOutcome::Pushed => {
                    let updated = match self.git.fast_forward(trunk, &merged).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(
                                wu_id = %workspace.req.wu_id,
                                %trunk,
                                error = %e,
                                "could not fast-forward local trunk"
                            );
                            false
                        }
                    };
                    return Ok(workspace.outcome(merged, updated));
                }
                PushOutcome::Rejected { reason } => {
                    warn!(
                        wu_id = %workspace.req.wu_id,
                        attempt = workspace.attempts,
                        retries = workspace.retries,
                        %reason,
                        "push rejected, trunk moved"
                    );
                    workspace.reason = format!("push rejected: {reason}");
                    workspace.merged = None;
                    self.integrate(workspace).await?;
                }
            }
        }
    }

    /// Run merge attempts until one lands on the scratch branch or the
    /// attempt budget is spent.
    async fn integrate(&self, workspace: &mut MergeWorkspace) -> Result<(), MergeError> {
        while workspace.attempts < workspace.retries {
            workspace.attempts += 1;
            if self.attempt(workspace).await? {
                return Ok(());
            }
        }
        Err(self.exhausted(workspace))
    }

    async fn attempt(&self, workspace: &mut MergeWorkspace) -> Result<bool, MergeError> {
        let MergePolicy { remote, trunk, .. } = &self.policy;
        let tip = self.git.fetch(remote, trunk).await?;
        if workspace.tips.last() != Some(&tip) {
            workspace.tips.push(tip.clone());
        }
        let req = &workspace.req;

        if self.git.is_ancestor(&req.lane_branch, &tip).await? {
            info!(wu_id = %req.wu_id, %tip, "lane branch already in trunk");
            workspace.already_merged = true;
            workspace.merged = Some(tip);
            return Ok(true);
        }
        workspace.already_merged = false;

        let scratch = &workspace.scratch;
        if workspace.worktree_ready {
            self.git.reset_hard(&scratch.worktree, &tip).await?;
        } else {
            self.git.create_branch(&scratch.branch, &tip).await?;
            self.git.add_worktree(&scratch.worktree, &scratch.branch).await?;
            workspace.worktree_ready = true;
        }

        if !self.merge_lane(req, &tip, scratch).await? {
            warn!(
                wu_id = %req.wu_id,
                attempt = workspace.attempts,
                retries = workspace.retries,
                %tip,
                "merge attempt failed"
            );
            workspace.reason =
                format!("`{}` does not rebase cleanly onto {}", req.lane_branch, short_sha(&tip));
            return Ok(false);
        }
        workspace.merged = Some(self.git.head(&scratch.worktree).await?);
        Ok(true)
    }

    fn exhausted(&self, workspace: &MergeWorkspace) -> MergeError {
        let MergePolicy { remote, trunk, .. } = &self.policy;
        // A rejected push means someone else advanced the trunk even when
        // every fetch happened to see the same tip.
        let moved = workspace.tips.len() > 1 || workspace.reason.starts_with("push rejected");
        if moved {
            MergeError::TrunkMovedTooFast {
                wu_id: workspace.req.wu_id.clone(),
                remote: remote.clone(),
                trunk: trunk.clone(),
                attempts: workspace.attempts,
            }
        } else {
            MergeError::MergeFailed {
                wu_id: workspace.req.wu_id.clone(),
                lane_branch: workspace.req.lane_branch.clone(),
                remote: remote.clone(),
                trunk: trunk.clone(),
                attempts: workspace.attempts,
                reason: workspace.reason.clone(),
            }
        }
    }

    /// Fast-forward the scratch branch to the lane, rebasing the lane onto
    /// `tip` first if needed.
    async fn merge_lane(
        &self,
        req: &MergeRequest,
        tip: &str,
        scratch: &Scratch,
    ) -> Result<bool, MergeError> {
        if self.git.merge_ff_only(&scratch.worktree, &req.lane_branch).await? {
            return Ok(true);
        }
        if !self.rebase_lane(req, tip, scratch).await? {
            return Ok(false);
        }
        Ok(self.git.merge_ff_only(&scratch.worktree, &req.lane_branch).await?)
    }

    async fn rebase_lane(
        &self,
        req: &MergeRequest,
        onto: &str,
        scratch: &Scratch,
    ) -> Result<bool, MergeError> {
        if let Some(worktree) = &req.lane_worktree {
            return Ok(self.git.rebase(worktree, onto).await?);
        }
        let path = &scratch.rebase_worktree;
        self.git.add_detached_worktree(path, &req.lane_branch).await?;
        let rebased = async {
            if !self.git.rebase(path, onto).await? {
                return Ok(false);
            }
            let head = self.git.head(path).await?;
            self.git.update_ref(&req.lane_branch, &head).await?;
            Ok::<_, GitError>(true)
        }
        .await;
        if let Err(e) = self.git.remove_worktree(path).await {
            warn!(path = %path.display(), error = %e, "failed to remove rebase worktree");
        }
        Ok(rebased?)
    }

    async fn push_with_backoff(
        &self,
        workspace: &MergeWorkspace,
    ) -> Result<PushOutcome, MergeError> {
        let MergePolicy { remote, trunk, push_retries, push_backoff, .. } = &self.policy;
        let wu_id = &workspace.req.wu_id;
        let tries = (*push_retries).max(1);
        let mut delay = *push_backoff;
        let mut attempt = 1;
        loop {
            match self.git.push(remote, &workspace.scratch.branch, trunk).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < tries => {
                    warn!(%wu_id, attempt, error = %e, "push failed, backing off");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(source) => {
                    return Err(MergeError::PushFailed {
                        wu_id: wu_id.clone(),
                        remote: remote.clone(),
                        trunk: trunk.clone(),
                        tries,
                        source,
                    })
                }
            }
        }
    }
}

fn short_sha(sha: &str) -> &str {
    lk_core::short(sha, 8)
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
