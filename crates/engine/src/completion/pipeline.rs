// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion pipeline: runs each stage's work and feeds the result back
//! into the [`CompletionMachine`].
//!
//! Stage errors never escape as `Err`; they become a `fail` transition and
//! the report carries the next command to run. The snapshot is saved after
//! every transition so a later process can pick up with `--resume`.
//!
//! Locks taken along the way:
//!
//! | stage       | locks                               |
//! |-------------|-------------------------------------|
//! | validating  | lane (kept until cleanup)           |
//! | merging     | lane + merge (kept through pushing) |
//! | cleaning_up | cleanup + state-store               |

use super::machine::{
    CompletionContext, CompletionMachine, CompletionSnapshot, Stage, Transition, TransitionError,
};
use crate::gates::{GateError, GateRunner};
use crate::merge::{
    MergeError, MergeExecutor, MergeOutcome, MergePolicy, MergeRequest, MergeWorkspace,
};
use lk_adapters::{GitAdapter, GitError};
use lk_core::{format_rfc3339, Clock, Remediation, SystemClock, WuEvent, WuId, WuStatus};
use lk_storage::{
    AcquireOptions, EventStore, EventStoreError, LockError, LockManager, LockSet, LockStatus,
    Resource, SnapshotError, SnapshotStore, WuEntry, WuIndex,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// State-store lock key guarding the WU event log during cleanup.
const EVENTS_STATE_KEY: &str = "wu-events";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0} has no events in the log")]
    UnknownWu(WuId),
    #[error("{wu_id} is {status}; only an in-progress WU can be completed")]
    NotClaimed { wu_id: WuId, status: WuStatus },
    #[error("lane `{lane}` is locked by {owner}, not {wu_id}")]
    LaneHeld { wu_id: WuId, lane: String, owner: String },
    #[error("worktree {} for {wu_id} is missing", .path.display())]
    MissingWorktree { wu_id: WuId, path: PathBuf },
    #[error(
        "worktree {} has `{}` checked out, expected `{expected}`",
        .path.display(),
        .found.as_deref().unwrap_or("a detached HEAD")
    )]
    WrongBranch { wu_id: WuId, path: PathBuf, expected: String, found: Option<String> },
    #[error("lane branch `{branch}` for {wu_id} does not exist")]
    MissingBranch { wu_id: WuId, branch: String },
    #[error("`{branch}` is not reachable from {remote}/{trunk} after the push")]
    NotPublished { wu_id: WuId, branch: String, remote: String, trunk: String },
    #[error("completion of {wu_id} stopped at {stage}; resume it instead of starting over")]
    InProgress { wu_id: WuId, stage: Stage },
    #[error("no saved completion for {0}")]
    NoSnapshot(WuId),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Events(#[from] EventStoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl Remediation for PipelineError {
    fn next_step(&self) -> Option<String> {
        match self {
            PipelineError::NotClaimed { wu_id, .. }
            | PipelineError::MissingWorktree { wu_id, .. }
            | PipelineError::WrongBranch { wu_id, .. }
            | PipelineError::MissingBranch { wu_id, .. } => {
                Some(format!("lk recover analyze --wu {wu_id}"))
            }
            PipelineError::LaneHeld { .. } => Some("lk lock list".to_string()),
            PipelineError::NotPublished { wu_id, .. } => Some(format!("lk merge --wu {wu_id}")),
            PipelineError::InProgress { wu_id, .. } => {
                Some(format!("lk complete --wu {wu_id} --resume"))
            }
            PipelineError::NoSnapshot(wu_id) => Some(format!("lk complete --wu {wu_id}")),
            PipelineError::Lock(e) => e.next_step(),
            PipelineError::Merge(e) => e.next_step(),
            PipelineError::Events(_) => Some("lk events replay".to_string()),
            PipelineError::UnknownWu(_)
            | PipelineError::Git(_)
            | PipelineError::Gate(_)
            | PipelineError::Snapshot(_)
            | PipelineError::Transition(_) => None,
        }
    }
}

/// Where a completion run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub wu_id: WuId,
    pub stage: Stage,
    pub context: CompletionContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeOutcome>,
    /// Command to run after a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
}

impl CompletionReport {
    pub fn succeeded(&self) -> bool {
        self.stage == Stage::Done
    }
}

pub struct PipelineDeps<C: Clock = SystemClock> {
    pub git: Arc<dyn GitAdapter>,
    pub gates: Arc<dyn GateRunner>,
    pub locks: LockManager<C>,
    pub events: EventStore,
    pub snapshots: SnapshotStore,
    pub merge: MergeExecutor,
    pub clock: C,
    /// Gates run here when the WU has no worktree.
    pub repo_root: PathBuf,
    /// Pid written into the lane lock, normally the agent that owns the
    /// claim. `None` records this process.
    pub lane_pid: Option<u32>,
}

/// Prepared merge carried from `merging` into `pushing`.
struct InFlight {
    workspace: MergeWorkspace,
    locks: LockSet,
}

enum StageOutcome {
    Advance,
    SkipGates,
}

pub struct CompletionPipeline<C: Clock = SystemClock> {
    git: Arc<dyn GitAdapter>,
    gates: Arc<dyn GateRunner>,
    locks: LockManager<C>,
    events: EventStore,
    snapshots: SnapshotStore,
    merge: MergeExecutor,
    clock: C,
    repo_root: PathBuf,
    lane_pid: Option<u32>,
    in_flight: Option<InFlight>,
    merged: Option<MergeOutcome>,
}

impl<C: Clock> CompletionPipeline<C> {
    pub fn new(deps: PipelineDeps<C>) -> Self {
        let PipelineDeps {
            git,
            gates,
            locks,
            events,
            snapshots,
            merge,
            clock,
            repo_root,
            lane_pid,
        } = deps;
        Self {
            git,
            gates,
            locks,
            events,
            snapshots,
            merge,
            clock,
            repo_root,
            lane_pid,
            in_flight: None,
            merged: None,
        }
    }

    /// Start or resume completion of `wu_id` and run it to `done` or `failed`.
    pub async fn complete(
        &mut self,
        wu_id: &WuId,
        resume: bool,
        prep_passed: bool,
    ) -> Result<CompletionReport, PipelineError> {
        let mut machine = if resume { self.resume(wu_id)? } else { self.start(wu_id)? };
        if prep_passed {
            machine.mark_prep_passed();
        }
        self.run(&mut machine).await
    }

    /// Fresh machine for `wu_id`. Refuses while an unfinished snapshot exists.
    pub fn start(&self, wu_id: &WuId) -> Result<CompletionMachine, PipelineError> {
        if let Some(snapshot) = self.snapshots.load::<CompletionSnapshot>(wu_id.as_str())? {
            if snapshot.stage != Stage::Done {
                return Err(PipelineError::InProgress {
                    wu_id: wu_id.clone(),
                    stage: snapshot.stage,
                });
            }
        }
        let entry = self.entry(wu_id)?;
        Ok(CompletionMachine::new(CompletionContext::new(wu_id.clone(), entry.worktree_path)))
    }

    /// Rebuild the machine from its snapshot after checking the lane lock
    /// and worktree. A failed machine is retried from `validating`.
    pub fn resume(&self, wu_id: &WuId) -> Result<CompletionMachine, PipelineError> {
        let snapshot = self
            .snapshots
            .load::<CompletionSnapshot>(wu_id.as_str())?
            .ok_or_else(|| PipelineError::NoSnapshot(wu_id.clone()))?;
        let mut machine = CompletionMachine::resume(snapshot, |s| self.revalidate(s))?;
        info!(
            %wu_id,
            stage = %machine.stage(),
            retries = machine.context().retry_count,
            "resuming completion"
        );
        if machine.stage() == Stage::Failed {
            machine.apply(Transition::Retry)?;
            self.save(&machine)?;
        }
        Ok(machine)
    }

    /// Drive `machine` until it is finished.
    pub async fn run(
        &mut self,
        machine: &mut CompletionMachine,
    ) -> Result<CompletionReport, PipelineError> {
        if machine.stage() == Stage::Idle {
            machine.apply(Transition::Start)?;
            self.save(machine)?;
        }

        let mut next_step = None;
        while machine.stage().is_operational() {
            let stage = machine.stage();
            let transition = match self.run_stage(stage, machine.context()).await {
                Ok(StageOutcome::Advance) => Transition::Succeeded,
                Ok(StageOutcome::SkipGates) => Transition::GatesSkipped,
                Err(e) => {
                    let wu_id = &machine.context().wu_id;
                    warn!(%wu_id, %stage, error = %e, "completion stage failed");
                    let hint = e
                        .next_step()
                        .unwrap_or_else(|| format!("lk complete --wu {wu_id} --resume"));
                    self.abandon_in_flight().await;
                    self.record_failure(wu_id, stage, &e, &hint);
                    next_step = Some(hint);
                    Transition::Fail { error: e.to_string() }
                }
            };
            machine.apply(transition)?;
            self.save(machine)?;
        }

        let wu_id = machine.context().wu_id.clone();
        if machine.stage() == Stage::Done {
            self.snapshots.remove(wu_id.as_str())?;
            info!(%wu_id, retries = machine.context().retry_count, "WU completed");
        }
        Ok(CompletionReport {
            wu_id,
            stage: machine.stage(),
            context: machine.context().clone(),
            merge: self.merged.take(),
            next_step,
        })
    }

    async fn run_stage(
        &mut self,
        stage: Stage,
        ctx: &CompletionContext,
    ) -> Result<StageOutcome, PipelineError> {
        match stage {
            Stage::Validating => self.validate(ctx).await?,
            Stage::Preparing => self.prepare(ctx).await?,
            Stage::Gating if ctx.prep_passed => {
                info!(wu_id = %ctx.wu_id, "gates already passed during preparation");
                return Ok(StageOutcome::SkipGates);
            }
            Stage::Gating => {
                let dir = ctx.worktree_path.as_deref().unwrap_or(&self.repo_root);
                self.gates.run(dir).await?;
            }
            Stage::Committing => self.commit(ctx).await?,
            Stage::Merging => self.start_merge(ctx).await?,
            Stage::Pushing => self.finish_merge(ctx).await?,
            Stage::CleaningUp => self.clean_up(ctx).await?,
            Stage::Idle | Stage::Done | Stage::Failed => {}
        }
        Ok(StageOutcome::Advance)
    }

    /// WU claimed, lane lock ours, worktree and branch present.
    async fn validate(&self, ctx: &CompletionContext) -> Result<(), PipelineError> {
        let wu_id = &ctx.wu_id;
        let entry = self.entry(wu_id)?;
        if entry.status != WuStatus::InProgress {
            return Err(PipelineError::NotClaimed { wu_id: wu_id.clone(), status: entry.status });
        }

        // The lane lock outlives this process; the merge locks do not.
        let lanes = match self.lane_pid {
            Some(pid) => self.locks.clone().with_pid(pid),
            None => self.locks.clone(),
        };
        let acquisition = lanes
            .acquire(&Resource::lane(&entry.lane), wu_id.as_str(), AcquireOptions::no_wait())
            .await?;
        if !acquisition.acquired {
            return Err(PipelineError::LaneHeld {
                wu_id: wu_id.clone(),
                lane: entry.lane,
                owner: acquisition.held_by.unwrap_or_default(),
            });
        }

        if let Some(path) = &ctx.worktree_path {
            if !path.exists() {
                return Err(PipelineError::MissingWorktree {
                    wu_id: wu_id.clone(),
                    path: path.clone(),
                });
            }
        }
        let branch = lane_branch(&entry);
        if !self.git.branch_exists(&branch).await? {
            return Err(PipelineError::MissingBranch { wu_id: wu_id.clone(), branch });
        }
        Ok(())
    }

    /// The worktree must be registered with git and have the lane branch
    /// checked out.
    async fn prepare(&self, ctx: &CompletionContext) -> Result<(), PipelineError> {
        let Some(path) = &ctx.worktree_path else {
            return Ok(());
        };
        let entry = self.entry(&ctx.wu_id)?;
        let expected = lane_branch(&entry);
        let worktrees = self.git.worktrees().await?;
        match worktrees.into_iter().find(|w| same_path(&w.path, path)) {
            Some(w) if w.branch.as_deref() == Some(expected.as_str()) => Ok(()),
            Some(w) => Err(PipelineError::WrongBranch {
                wu_id: ctx.wu_id.clone(),
                path: path.clone(),
                expected,
                found: w.branch,
            }),
            None => Err(PipelineError::MissingWorktree {
                wu_id: ctx.wu_id.clone(),
                path: path.clone(),
            }),
        }
    }

    async fn commit(&self, ctx: &CompletionContext) -> Result<(), PipelineError> {
        let Some(path) = &ctx.worktree_path else {
            return Ok(());
        };
        let entry = self.entry(&ctx.wu_id)?;
        let title = if entry.title.is_empty() { "complete" } else { entry.title.as_str() };
        let committed = self.git.commit_all(path, &format!("{}: {}", ctx.wu_id, title)).await?;
        info!(wu_id = %ctx.wu_id, committed, "committed pending work");
        Ok(())
    }

    async fn start_merge(&mut self, ctx: &CompletionContext) -> Result<(), PipelineError> {
        self.abandon_in_flight().await;
        let entry = self.entry(&ctx.wu_id)?;
        let in_flight = self.prepare_merge(ctx, &entry).await?;
        self.in_flight = Some(in_flight);
        Ok(())
    }

    /// Publish the prepared merge, then confirm the lane is in the remote
    /// trunk. A process resumed at `pushing` prepares again first.
    async fn finish_merge(&mut self, ctx: &CompletionContext) -> Result<(), PipelineError> {
        let entry = self.entry(&ctx.wu_id)?;
        let InFlight { mut workspace, locks } = match self.in_flight.take() {
            Some(in_flight) => in_flight,
            None => {
                info!(wu_id = %ctx.wu_id, "no prepared merge in this process, preparing again");
                self.prepare_merge(ctx, &entry).await?
            }
        };

        let published = self.merge.publish(&mut workspace).await;
        workspace.cleanup().await;
        if let Err(e) = locks.release() {
            warn!(wu_id = %ctx.wu_id, error = %e, "failed to release merge locks");
        }
        let outcome = published?;

        let MergePolicy { remote, trunk, .. } = self.merge.policy();
        let branch = lane_branch(&entry);
        let tip = self.git.fetch(remote, trunk).await?;
        if !self.git.is_ancestor(&branch, &tip).await? {
            return Err(PipelineError::NotPublished {
                wu_id: ctx.wu_id.clone(),
                branch,
                remote: remote.clone(),
                trunk: trunk.clone(),
            });
        }
        info!(
            wu_id = %ctx.wu_id,
            merged = %outcome.merged_sha,
            attempts = outcome.attempts,
            "lane published"
        );
        self.merged = Some(outcome);
        Ok(())
    }

    async fn prepare_merge(
        &self,
        ctx: &CompletionContext,
        entry: &WuEntry,
    ) -> Result<InFlight, PipelineError> {
        let wu_id = &ctx.wu_id;
        let locks = self
            .locks
            .lock_ordered(
                &[Resource::lane(&entry.lane), Resource::merge()],
                wu_id.as_str(),
                AcquireOptions::default(),
            )
            .await?;
        let request = MergeRequest {
            lane_worktree: ctx.worktree_path.clone(),
            ..MergeRequest::new(wu_id.clone(), lane_branch(entry))
        };
        let workspace = self.merge.prepare(&request).await?;
        Ok(InFlight { workspace, locks })
    }

    /// Remove the worktree and lane branch, record completion, and drop
    /// the lane lock. Each step tolerates having already run.
    async fn clean_up(&self, ctx: &CompletionContext) -> Result<(), PipelineError> {
        let wu_id = &ctx.wu_id;
        let entry = self.entry(wu_id)?;
        let locks = self
            .locks
            .lock_ordered(
                &[Resource::cleanup(), Resource::state(EVENTS_STATE_KEY)],
                wu_id.as_str(),
                AcquireOptions::default(),
            )
            .await?;

        if let Some(path) = &ctx.worktree_path {
            let registered = self.git.worktrees().await?.iter().any(|w| same_path(&w.path, path));
            if registered {
                self.git.remove_worktree(path).await?;
            }
        }
        let branch = lane_branch(&entry);
        if self.git.branch_exists(&branch).await? {
            self.git.delete_branch(&branch).await?;
        }

        if entry.status != WuStatus::Done {
            let event = WuEvent::Complete {
                wu_id: wu_id.clone(),
                timestamp: format_rfc3339(self.clock.utc()),
            };
            self.events.append(&event)?;
        }
        locks.release()?;
        self.release_lane(&entry.lane, wu_id)?;
        info!(%wu_id, %branch, "cleaned up");
        Ok(())
    }

    fn release_lane(&self, lane: &str, wu_id: &WuId) -> Result<(), PipelineError> {
        let resource = Resource::lane(lane);
        let status = self.locks.inspect(&resource)?;
        if let Some(record) = status.record() {
            if record.owner_id == wu_id.as_str() {
                self.locks.release(&resource, &record.lock_id)?;
            }
        }
        Ok(())
    }

    fn revalidate(&self, snapshot: &CompletionSnapshot) -> Result<(), PipelineError> {
        let ctx = &snapshot.context;
        let entry = self.entry(&ctx.wu_id)?;
        if let LockStatus::Held(record) = self.locks.inspect(&Resource::lane(&entry.lane))? {
            if record.owner_id != ctx.wu_id.as_str() {
                return Err(PipelineError::LaneHeld {
                    wu_id: ctx.wu_id.clone(),
                    lane: entry.lane,
                    owner: record.owner_id,
                });
            }
        }
        let needs_worktree = matches!(
            snapshot.stage,
            Stage::Preparing
                | Stage::Gating
                | Stage::Committing
                | Stage::Merging
                | Stage::Pushing
        );
        if let Some(path) = ctx.worktree_path.as_ref().filter(|_| needs_worktree) {
            if !path.exists() {
                return Err(PipelineError::MissingWorktree {
                    wu_id: ctx.wu_id.clone(),
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    async fn abandon_in_flight(&mut self) {
        if let Some(InFlight { workspace, locks }) = self.in_flight.take() {
            workspace.cleanup().await;
            drop(locks);
        }
    }

    /// Leave a checkpoint so the failure shows up in the WU's history.
    fn record_failure(&self, wu_id: &WuId, stage: Stage, error: &PipelineError, hint: &str) {
        if matches!(error, PipelineError::UnknownWu(_)) {
            return;
        }
        let event = WuEvent::Checkpoint {
            wu_id: wu_id.clone(),
            note: format!("completion failed at {stage}: {error}"),
            timestamp: format_rfc3339(self.clock.utc()),
            next_steps: Some(hint.to_string()),
        };
        if let Err(e) = self.events.append(&event) {
            warn!(%wu_id, error = %e, "could not record completion failure");
        }
    }

    fn save(&self, machine: &CompletionMachine) -> Result<(), PipelineError> {
        let snapshot = machine.snapshot(self.clock.utc());
        self.snapshots.save(snapshot.context.wu_id.as_str(), &snapshot)?;
        Ok(())
    }

    fn entry(&self, wu_id: &WuId) -> Result<WuEntry, PipelineError> {
        let events = self.events.read_events()?;
        WuIndex::replay(&events)
            .get(wu_id.as_str())
            .cloned()
            .ok_or_else(|| PipelineError::UnknownWu(wu_id.clone()))
    }
}

fn lane_branch(entry: &WuEntry) -> String {
    entry.branch.clone().unwrap_or_else(|| lk_core::wu::lane_branch_name(&entry.lane, &entry.id))
}

fn same_path(a: &Path, b: &Path) -> bool {
    let canonical = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    a == b || canonical(a) == canonical(b)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
