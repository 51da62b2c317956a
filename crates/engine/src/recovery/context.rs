// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observed state the recovery analyzer reasons about, and the sources
//! that assemble it.

use super::RecoveryError;
use async_trait::async_trait;
use lk_adapters::{GitAdapter, GitError};
use lk_core::{Clock, SystemClock, WuId, WuStatus};
use lk_storage::{EventStore, LockManager, LockStatus, Resource, WuIndex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// The lane lock as seen by recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LaneLock {
    Free,
    Held { owner_id: String, pid: u32 },
    Stale { owner_id: String, pid: u32, age_secs: u64 },
    Zombie { owner_id: String, pid: u32 },
}

impl LaneLock {
    fn from_status(status: &LockStatus) -> Self {
        match status {
            LockStatus::Free | LockStatus::Corrupt => LaneLock::Free,
            LockStatus::Held(r) => LaneLock::Held { owner_id: r.owner_id.clone(), pid: r.pid },
            LockStatus::Stale { record, age } => LaneLock::Stale {
                owner_id: record.owner_id.clone(),
                pid: record.pid,
                age_secs: age.as_secs(),
            },
            LockStatus::Zombie(r) => LaneLock::Zombie { owner_id: r.owner_id.clone(), pid: r.pid },
        }
    }

    /// Owner of a lock that is no longer valid.
    pub fn reclaimable_owner(&self) -> Option<&str> {
        match self {
            LaneLock::Stale { owner_id, .. } | LaneLock::Zombie { owner_id, .. } => Some(owner_id),
            LaneLock::Free | LaneLock::Held { .. } => None,
        }
    }
}

/// Fully resolved snapshot of one WU's surroundings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryContext {
    pub wu_id: WuId,
    /// `None` when the event log has never heard of the WU.
    pub status: Option<WuStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    pub worktree_exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub branch_exists: bool,
    /// The WU's commits are reachable from the remote trunk.
    pub merged: bool,
    /// The worktree holds changes that were never committed.
    pub dirty: bool,
    pub lane_lock: LaneLock,
}

impl RecoveryContext {
    /// Nothing known and nothing on disk.
    pub fn empty(wu_id: WuId) -> Self {
        Self {
            wu_id,
            status: None,
            lane: None,
            worktree_path: None,
            worktree_exists: false,
            branch: None,
            branch_exists: false,
            merged: false,
            dirty: false,
            lane_lock: LaneLock::Free,
        }
    }
}

/// Builds a [`RecoveryContext`] for a WU.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn context(&self, wu_id: &WuId) -> Result<RecoveryContext, RecoveryError>;
}

/// Context from git, the filesystem, the event log, and the lock directory.
///
/// Git probes never fail the build. Each error resolves to the reading
/// that leads to the least destructive action: not merged, branch present,
/// worktree dirty, lock valid.
pub struct GitContextSource<C: Clock = SystemClock> {
    git: Arc<dyn GitAdapter>,
    events: EventStore,
    locks: LockManager<C>,
    remote: String,
    trunk: String,
}

impl<C: Clock> GitContextSource<C> {
    pub fn new(
        git: Arc<dyn GitAdapter>,
        events: EventStore,
        locks: LockManager<C>,
        remote: impl Into<String>,
        trunk: impl Into<String>,
    ) -> Self {
        Self { git, events, locks, remote: remote.into(), trunk: trunk.into() }
    }

    /// A worktree git knows for `branch`, for claims that never reached the log.
    async fn registered_worktree(&self, wu_id: &WuId, branch: &str) -> Option<PathBuf> {
        let worktrees = fail_safe_with(wu_id, "worktrees", self.git.worktrees().await, Vec::new());
        worktrees.into_iter().find(|w| w.branch.as_deref() == Some(branch)).map(|w| w.path)
    }

    async fn is_merged(&self, wu_id: &WuId, branch: Option<&str>, branch_exists: bool) -> bool {
        if let Err(e) = self.git.fetch(&self.remote, &self.trunk).await {
            warn!(%wu_id, error = %e, "fetch failed, probing the last known trunk");
        }
        let trunk = format!("{}/{}", self.remote, self.trunk);
        let prefix = format!("{wu_id}:");
        let probe = match branch {
            // A freshly claimed branch sits at the trunk tip and is trivially
            // an ancestor; it only counts once one of its WU commits is in.
            Some(branch) if branch_exists => match self.git.is_ancestor(branch, &trunk).await {
                Ok(true) => self.git.log_contains(branch, &prefix).await,
                other => other,
            },
            // Branch gone: look for the WU's commit prefix in trunk history
            _ => self.git.log_contains(&trunk, &prefix).await,
        };
        fail_safe(wu_id, "merged", probe, false)
    }
}

#[async_trait]
impl<C: Clock> ContextSource for GitContextSource<C> {
    async fn context(&self, wu_id: &WuId) -> Result<RecoveryContext, RecoveryError> {
        let index = WuIndex::replay(&self.events.read_events()?);
        let Some(entry) = index.get(wu_id.as_str()) else {
            return Ok(RecoveryContext::empty(wu_id.clone()));
        };

        let lane = Some(entry.lane.clone()).filter(|l| !l.is_empty());
        let branch = entry
            .branch
            .clone()
            .or_else(|| lane.as_deref().map(|l| lk_core::wu::lane_branch_name(l, wu_id)));
        let branch_exists = match &branch {
            Some(b) => fail_safe(wu_id, "branch_exists", self.git.branch_exists(b).await, true),
            None => false,
        };
        let worktree_path = match (&entry.worktree_path, &branch) {
            (Some(path), _) => Some(path.clone()),
            (None, Some(b)) => self.registered_worktree(wu_id, b).await,
            (None, None) => None,
        };
        let worktree_exists = worktree_path.as_ref().is_some_and(|p| p.exists());
        let dirty = match &worktree_path {
            Some(path) if worktree_exists => {
                let changes = self.git.uncommitted_changes(path).await.map(|c| !c.is_empty());
                fail_safe(wu_id, "dirty", changes, true)
            }
            _ => false,
        };
        let merged = self.is_merged(wu_id, branch.as_deref(), branch_exists).await;

        let lane_lock = match &lane {
            Some(l) => match self.locks.inspect(&Resource::lane(l)) {
                Ok(status) => LaneLock::from_status(&status),
                Err(e) => {
                    warn!(%wu_id, error = %e, "lane lock unreadable, assuming it is held");
                    LaneLock::Held { owner_id: String::new(), pid: 0 }
                }
            },
            None => LaneLock::Free,
        };

        Ok(RecoveryContext {
            wu_id: wu_id.clone(),
            status: Some(entry.status),
            lane,
            worktree_path,
            worktree_exists,
            branch,
            branch_exists,
            merged,
            dirty,
            lane_lock,
        })
    }
}

fn fail_safe<T: std::fmt::Display>(
    wu_id: &WuId,
    probe: &str,
    result: Result<T, GitError>,
    fallback: T,
) -> T {
    result.unwrap_or_else(|e| {
        warn!(%wu_id, probe, error = %e, fallback = %fallback, "git probe failed");
        fallback
    })
}

fn fail_safe_with<T>(wu_id: &WuId, probe: &str, result: Result<T, GitError>, fallback: T) -> T {
    result.unwrap_or_else(|e| {
        warn!(%wu_id, probe, error = %e, "git probe failed");
        fallback
    })
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
