// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Classify what a crashed or interrupted run left behind.
//!
//! [`analyze_recovery`] is pure: everything it looks at is already in the
//! [`RecoveryContext`].

use super::context::{LaneLock, RecoveryContext};
use lk_core::{WuId, WuStatus};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// Worktree on disk, but the claim was never recorded.
    PartialClaim,
    /// Claimed, but the worktree is gone.
    OrphanClaim,
    /// Work reached the trunk; completion was never recorded.
    MergedNotDone,
    /// Retired WU whose worktree is still on disk.
    LeftoverWorktree,
    /// The WU's lane lock belongs to a dead or stale holder.
    ZombieLock,
}

lk_core::simple_display! {
    IssueCode {
        PartialClaim => "partial_claim",
        OrphanClaim => "orphan_claim",
        MergedNotDone => "merged_not_done",
        LeftoverWorktree => "leftover_worktree",
        ZombieLock => "zombie_lock",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Record the missing claim and keep working in the worktree.
    Resume,
    /// Throw the claim away: worktree, lane branch, and claim status.
    Reset,
    /// Record completion for work that already reached the trunk.
    Complete,
    /// Remove a leftover worktree.
    Cleanup,
    /// Release a dead holder's lane lock.
    ReleaseLock,
}

lk_core::simple_display! {
    ActionKind {
        Resume => "resume",
        Reset => "reset",
        Complete => "complete",
        Cleanup => "cleanup",
        ReleaseLock => "release_lock",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown recovery action `{}` \
             (expected resume, reset, complete, cleanup, release_lock)",
            self.0
        )
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "resume" => Ok(ActionKind::Resume),
            "reset" => Ok(ActionKind::Reset),
            "complete" => Ok(ActionKind::Complete),
            "cleanup" => Ok(ActionKind::Cleanup),
            "release_lock" => Ok(ActionKind::ReleaseLock),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryIssue {
    pub code: IssueCode,
    pub description: String,
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub description: String,
    /// Ready to paste into a shell.
    pub command: String,
    pub requires_force: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RecoveryAction {
    fn new(wu_id: &WuId, kind: ActionKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            command: format!("lk recover run --wu {wu_id} --action {kind}"),
            requires_force: false,
            warning: None,
        }
    }

    fn destructive(mut self, warning: impl Into<String>) -> Self {
        self.requires_force = true;
        self.command.push_str(" --force");
        self.warning = Some(warning.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryAnalysis {
    pub has_issues: bool,
    pub issues: Vec<RecoveryIssue>,
    pub actions: Vec<RecoveryAction>,
    pub wu_id: WuId,
}

impl RecoveryAnalysis {
    pub fn action(&self, kind: ActionKind) -> Option<&RecoveryAction> {
        self.actions.iter().find(|a| a.kind == kind)
    }

    pub fn has(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

struct Findings<'a> {
    ctx: &'a RecoveryContext,
    issues: Vec<RecoveryIssue>,
    actions: Vec<RecoveryAction>,
}

impl Findings<'_> {
    fn issue(&mut self, code: IssueCode, description: String, context: serde_json::Value) {
        self.issues.push(RecoveryIssue { code, description, context });
    }

    /// Actions are listed once, in the order issues first asked for them.
    fn action(&mut self, action: RecoveryAction) {
        if !self.actions.iter().any(|a| a.kind == action.kind) {
            self.actions.push(action);
        }
    }

    fn reset_action(&self) -> RecoveryAction {
        let ctx = self.ctx;
        let reset = RecoveryAction::new(
            &ctx.wu_id,
            ActionKind::Reset,
            "remove the worktree and lane branch and release the claim",
        );
        if ctx.worktree_exists && ctx.dirty {
            let path = ctx
                .worktree_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            reset.destructive(format!("discards uncommitted changes in {path}"))
        } else if ctx.branch_exists && !ctx.merged {
            let branch = ctx.branch.as_deref().unwrap_or_default();
            reset.destructive(format!("deletes `{branch}`, which may hold commits not in trunk"))
        } else {
            reset
        }
    }

    fn complete_action(&self) -> RecoveryAction {
        let description = if self.ctx.branch_exists {
            "record completion, delete the merged lane branch, and release the lane"
        } else {
            "record completion and release the lane"
        };
        RecoveryAction::new(&self.ctx.wu_id, ActionKind::Complete, description)
    }
}

/// Classify the inconsistencies in `ctx` and propose actions for each.
pub fn analyze_recovery(ctx: &RecoveryContext) -> RecoveryAnalysis {
    let mut found = Findings { ctx, issues: Vec::new(), actions: Vec::new() };
    let wu_id = &ctx.wu_id;
    let status = ctx.status.unwrap_or(WuStatus::Ready);
    let worktree = ctx.worktree_path.as_deref().map(|p| p.display().to_string());

    if ctx.worktree_exists && status == WuStatus::Ready {
        found.issue(
            IssueCode::PartialClaim,
            format!("worktree exists but {wu_id} is still ready; the claim did not finish"),
            serde_json::json!({ "worktreePath": worktree, "status": status }),
        );
        if ctx.lane.is_some() {
            found.action(RecoveryAction::new(
                wu_id,
                ActionKind::Resume,
                "record the claim and keep the worktree",
            ));
        }
        let reset = found.reset_action();
        found.action(reset);
    }

    let claimed = status.is_claimed();
    if claimed && ctx.worktree_path.is_some() && !ctx.worktree_exists {
        found.issue(
            IssueCode::OrphanClaim,
            format!("{wu_id} is {status} but its worktree is missing"),
            serde_json::json!({
                "worktreePath": worktree,
                "status": status,
                "branchExists": ctx.branch_exists,
                "merged": ctx.merged,
            }),
        );
        let action = if ctx.merged { found.complete_action() } else { found.reset_action() };
        found.action(action);
    }

    if ctx.merged && !ctx.worktree_exists && !status.is_terminal() {
        found.issue(
            IssueCode::MergedNotDone,
            format!("{wu_id} reached the trunk but was never marked done"),
            serde_json::json!({
                "status": status,
                "branch": ctx.branch,
                "branchExists": ctx.branch_exists,
            }),
        );
        let complete = found.complete_action();
        found.action(complete);
    }

    if status.is_terminal() && ctx.worktree_exists {
        found.issue(
            IssueCode::LeftoverWorktree,
            format!("{wu_id} is {status} but its worktree is still on disk"),
            serde_json::json!({ "worktreePath": worktree, "status": status, "dirty": ctx.dirty }),
        );
        let cleanup =
            RecoveryAction::new(wu_id, ActionKind::Cleanup, "remove the leftover worktree");
        found.action(if ctx.dirty {
            let path = worktree.as_deref().unwrap_or_default();
            cleanup.destructive(format!("discards uncommitted changes in {path}"))
        } else {
            cleanup
        });
    }

    if ctx.lane_lock.reclaimable_owner() == Some(wu_id.as_str()) {
        let (state, pid) = match &ctx.lane_lock {
            LaneLock::Zombie { pid, .. } => ("dead", *pid),
            LaneLock::Stale { pid, .. } => ("stale", *pid),
            LaneLock::Free | LaneLock::Held { .. } => ("valid", 0),
        };
        found.issue(
            IssueCode::ZombieLock,
            format!(
                "lane `{}` is locked for {wu_id} by a {state} holder (pid {pid})",
                ctx.lane.as_deref().unwrap_or_default()
            ),
            serde_json::json!({ "lane": ctx.lane, "pid": pid, "holder": state }),
        );
        found.action(RecoveryAction::new(wu_id, ActionKind::ReleaseLock, "release the lane lock"));
    }

    let Findings { issues, actions, .. } = found;
    RecoveryAnalysis { has_issues: !issues.is_empty(), issues, actions, wu_id: wu_id.clone() }
}

#[cfg(test)]
#[path = "analyzer_tests.rs"]
mod tests;
