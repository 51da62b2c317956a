// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion state machine.
//!
//! ```text
//! idle -> validating -> preparing -> gating -> committing -> merging
//!      -> pushing -> cleaning_up -> done
//!                        gating --gates_skipped [prep_passed]--> committing
//! any operational stage --fail--> failed --retry--> validating
//! ```

use chrono::{DateTime, Utc};
use lk_core::WuId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Validating,
    Preparing,
    Gating,
    Committing,
    Merging,
    Pushing,
    CleaningUp,
    Done,
    Failed,
}

lk_core::simple_display! {
    Stage {
        Idle => "idle",
        Validating => "validating",
        Preparing => "preparing",
        Gating => "gating",
        Committing => "committing",
        Merging => "merging",
        Pushing => "pushing",
        CleaningUp => "cleaning_up",
        Done => "done",
        Failed => "failed",
    }
}

impl Stage {
    /// Stages that do work and can fail.
    pub fn is_operational(self) -> bool {
        !matches!(self, Stage::Idle | Stage::Done | Stage::Failed)
    }

    /// Happy-path successor.
    fn next(self) -> Option<Stage> {
        Some(match self {
            Stage::Idle => Stage::Validating,
            Stage::Validating => Stage::Preparing,
            Stage::Preparing => Stage::Gating,
            Stage::Gating => Stage::Committing,
            Stage::Committing => Stage::Merging,
            Stage::Merging => Stage::Pushing,
            Stage::Pushing => Stage::CleaningUp,
            Stage::CleaningUp => Stage::Done,
            Stage::Done | Stage::Failed => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Leave `idle`.
    Start,
    /// The current stage finished its work.
    Succeeded,
    /// Skip `gating`; only legal when preparation already ran the gates.
    GatesSkipped,
    Fail { error: String },
    Retry,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Succeeded => "succeeded",
            Transition::GatesSkipped => "gates_skipped",
            Transition::Fail { .. } => "fail",
            Transition::Retry => "retry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("`{transition}` is not a legal transition from {from}")]
    Illegal { from: Stage, transition: &'static str },
    #[error("gates can only be skipped after preparation already ran them")]
    GatesNotPassed,
}

/// Plain data carried across stages and persisted in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionContext {
    pub wu_id: WuId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    #[serde(default)]
    pub prep_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<Stage>,
    #[serde(default)]
    pub retry_count: u32,
}

impl CompletionContext {
    pub fn new(wu_id: WuId, worktree_path: Option<PathBuf>) -> Self {
        Self {
            wu_id,
            worktree_path,
            prep_passed: false,
            error: None,
            failed_at: None,
            retry_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSnapshot {
    pub stage: Stage,
    pub context: CompletionContext,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMachine {
    stage: Stage,
    context: CompletionContext,
}

impl CompletionMachine {
    pub fn new(context: CompletionContext) -> Self {
        Self { stage: Stage::Idle, context }
    }

    /// Rebuild a machine from a persisted snapshot. `revalidate` must check
    /// that the world still matches the snapshot (lane lock, worktree)
    /// before the snapshot is trusted.
    pub fn resume<E>(
        snapshot: CompletionSnapshot,
        revalidate: impl FnOnce(&CompletionSnapshot) -> Result<(), E>,
    ) -> Result<Self, E> {
        revalidate(&snapshot)?;
        Ok(Self { stage: snapshot.stage, context: snapshot.context })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn context(&self) -> &CompletionContext {
        &self.context
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Done | Stage::Failed)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> CompletionSnapshot {
        CompletionSnapshot { stage: self.stage, context: self.context.clone(), updated_at: now }
    }

    /// Apply a transition; the machine is unchanged when it is illegal.
    pub fn apply(&mut self, transition: Transition) -> Result<Stage, TransitionError> {
        let illegal =
            || TransitionError::Illegal { from: self.stage, transition: transition.name() };
        let next = match (&transition, self.stage) {
            (Transition::Start, Stage::Idle) => Stage::Validating,
            (Transition::Succeeded, from) if from.is_operational() => {
                from.next().ok_or_else(illegal)?
            }
            (Transition::GatesSkipped, Stage::Gating) => {
                if !self.context.prep_passed {
                    return Err(TransitionError::GatesNotPassed);
                }
                Stage::Committing
            }
            (Transition::Fail { .. }, from) if from.is_operational() => Stage::Failed,
            (Transition::Retry, Stage::Failed) => Stage::Validating,
            _ => return Err(illegal()),
        };

        match transition {
            Transition::Fail { error } => {
                self.context.error = Some(error);
                self.context.failed_at = Some(self.stage);
            }
            Transition::Retry => {
                self.context.retry_count += 1;
                self.context.error = None;
                self.context.failed_at = None;
            }
            Transition::Start | Transition::Succeeded | Transition::GatesSkipped => {}
        }
        tracing::debug!(
            wu_id = %self.context.wu_id,
            from = %self.stage,
            to = %next,
            "completion transition"
        );
        self.stage = next;
        Ok(next)
    }

    /// Record that preparation already ran the gates.
    pub fn mark_prep_passed(&mut self) {
        self.context.prep_passed = true;
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
