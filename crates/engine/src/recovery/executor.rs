// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Apply one recovery action to a WU.
//!
//! The context is rebuilt and re-analyzed right before acting, and only an
//! action the analysis proposes is carried out. Event appends and worktree
//! removal happen under the cleanup and state-store locks.

use super::analyzer::{analyze_recovery, ActionKind, RecoveryAnalysis};
use super::context::{ContextSource, RecoveryContext};
use super::RecoveryError;
use lk_adapters::GitAdapter;
use lk_core::{format_rfc3339, Clock, SystemClock, WuEvent, WuId};
use lk_storage::{AcquireOptions, EventStore, LockManager, LockStatus, Resource, WuEntry, WuIndex};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

const EVENTS_STATE_KEY: &str = "wu-events";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryOutcome {
    pub wu_id: WuId,
    pub action: ActionKind,
    /// What was done, in order.
    pub steps: Vec<String>,
}

pub struct RecoveryExecutor<C: Clock = SystemClock> {
    git: Arc<dyn GitAdapter>,
    source: Arc<dyn ContextSource>,
    events: EventStore,
    locks: LockManager<C>,
    clock: C,
}

impl<C: Clock> RecoveryExecutor<C> {
    pub fn new(
        git: Arc<dyn GitAdapter>,
        source: Arc<dyn ContextSource>,
        events: EventStore,
        locks: LockManager<C>,
        clock: C,
    ) -> Self {
        Self { git, source, events, locks, clock }
    }

    pub async fn analyze(&self, wu_id: &WuId) -> Result<RecoveryAnalysis, RecoveryError> {
        let ctx = self.source.context(wu_id).await?;
        Ok(analyze_recovery(&ctx))
    }

    pub async fn execute(
        &self,
        wu_id: &WuId,
        kind: ActionKind,
        force: bool,
    ) -> Result<RecoveryOutcome, RecoveryError> {
        let ctx = self.source.context(wu_id).await?;
        let analysis = analyze_recovery(&ctx);
        let action = analysis.action(kind).ok_or_else(|| RecoveryError::NotApplicable {
            wu_id: wu_id.clone(),
            action: kind,
            proposed: proposed_list(&analysis),
        })?;
        if action.requires_force && !force {
            return Err(RecoveryError::ForceRequired {
                wu_id: wu_id.clone(),
                action: kind,
                warning: action.warning.clone().unwrap_or_default(),
            });
        }

        let owner = format!("recover-{wu_id}");
        let locks = self
            .locks
            .lock_ordered(
                &[Resource::cleanup(), Resource::state(EVENTS_STATE_KEY)],
                &owner,
                AcquireOptions::default(),
            )
            .await?;
        let mut steps = Vec::new();
        match kind {
            ActionKind::Resume => self.resume(&ctx, &mut steps)?,
            ActionKind::Reset => self.reset(&ctx, &mut steps).await?,
            ActionKind::Complete => self.complete(&ctx, &mut steps).await?,
            ActionKind::Cleanup => self.remove_worktree(&ctx, &mut steps).await?,
            ActionKind::ReleaseLock => self.release_dead_lock(&ctx, &mut steps)?,
        }
        locks.release()?;

        info!(%wu_id, action = %kind, steps = steps.len(), "recovery action applied");
        Ok(RecoveryOutcome { wu_id: wu_id.clone(), action: kind, steps })
    }

    fn resume(&self, ctx: &RecoveryContext, steps: &mut Vec<String>) -> Result<(), RecoveryError> {
        let entry = self.entry(&ctx.wu_id)?;
        let lane = ctx.lane.clone().unwrap_or_default();
        let title = entry
            .map(|e| e.title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| ctx.wu_id.to_string());
        self.events.append(&WuEvent::Claim {
            wu_id: ctx.wu_id.clone(),
            lane,
            title,
            timestamp: self.now(),
            worktree_path: ctx.worktree_path.clone(),
            branch: ctx.branch.clone(),
        })?;
        steps.push("recorded claim".to_string());
        Ok(())
    }

    async fn reset(
        &self,
        ctx: &RecoveryContext,
        steps: &mut Vec<String>,
    ) -> Result<(), RecoveryError> {
        self.remove_worktree(ctx, steps).await?;
        if let Some(branch) = ctx.branch.as_deref().filter(|_| ctx.branch_exists) {
            self.git.delete_branch(branch).await?;
            steps.push(format!("deleted branch {branch}"));
        }
        if ctx.status.is_some_and(|s| s.is_claimed()) {
            self.events.append(&WuEvent::Release {
                wu_id: ctx.wu_id.clone(),
                reason: "reset by recovery".to_string(),
                timestamp: self.now(),
            })?;
            steps.push("recorded release".to_string());
        }
        self.release_own_lane_lock(ctx, steps)
    }

    async fn complete(
        &self,
        ctx: &RecoveryContext,
        steps: &mut Vec<String>,
    ) -> Result<(), RecoveryError> {
        if let Some(branch) = ctx.branch.as_deref().filter(|_| ctx.branch_exists && ctx.merged) {
            self.git.delete_branch(branch).await?;
            steps.push(format!("deleted merged branch {branch}"));
        }
        self.events.append(&WuEvent::Complete {
            wu_id: ctx.wu_id.clone(),
            timestamp: self.now(),
        })?;
        steps.push("recorded completion".to_string());
        self.release_own_lane_lock(ctx, steps)
    }

    async fn remove_worktree(
        &self,
        ctx: &RecoveryContext,
        steps: &mut Vec<String>,
    ) -> Result<(), RecoveryError> {
        if let Some(path) = ctx.worktree_path.as_deref().filter(|_| ctx.worktree_exists) {
            self.git.remove_worktree(path).await?;
            steps.push(format!("removed worktree {}", path.display()));
        }
        Ok(())
    }

    /// Release a lane lock the WU holds, whatever its state.
    fn release_own_lane_lock(
        &self,
        ctx: &RecoveryContext,
        steps: &mut Vec<String>,
    ) -> Result<(), RecoveryError> {
        let Some(lane) = &ctx.lane else {
            return Ok(());
        };
        let resource = Resource::lane(lane);
        let status = self.locks.inspect(&resource)?;
        if let Some(record) = status.record().filter(|r| r.owner_id == ctx.wu_id.as_str()) {
            if self.locks.release(&resource, &record.lock_id)? {
                steps.push(format!("released {resource}"));
            }
        }
        Ok(())
    }

    /// Release the lane lock only while it is still dead or stale; a holder
    /// that came back in the meantime keeps it.
    fn release_dead_lock(
        &self,
        ctx: &RecoveryContext,
        steps: &mut Vec<String>,
    ) -> Result<(), RecoveryError> {
        let Some(lane) = &ctx.lane else {
            return Ok(());
        };
        let resource = Resource::lane(lane);
        match self.locks.inspect(&resource)? {
            LockStatus::Zombie(record) | LockStatus::Stale { record, .. }
                if record.owner_id == ctx.wu_id.as_str() =>
            {
                if self.locks.release(&resource, &record.lock_id)? {
                    steps.push(format!("released {resource} (pid {})", record.pid));
                }
                Ok(())
            }
            LockStatus::Held(record) => {
                Err(RecoveryError::LockActive { resource, owner: record.owner_id })
            }
            _ => Ok(()),
        }
    }

    fn entry(&self, wu_id: &WuId) -> Result<Option<WuEntry>, RecoveryError> {
        let events = self.events.read_events()?;
        Ok(WuIndex::replay(&events).get(wu_id.as_str()).cloned())
    }

    fn now(&self) -> String {
        format_rfc3339(self.clock.utc())
    }
}

fn proposed_list(analysis: &RecoveryAnalysis) -> String {
    if analysis.actions.is_empty() {
        return "none".to_string();
    }
    analysis.actions.iter().map(|a| a.kind.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
