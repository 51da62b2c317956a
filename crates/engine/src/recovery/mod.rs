// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery: detect what crashed runs left behind and repair it.

pub mod analyzer;
pub mod context;
pub mod executor;

pub use analyzer::{
    analyze_recovery, ActionKind, IssueCode, RecoveryAction, RecoveryAnalysis, RecoveryIssue,
    UnknownAction,
};
pub use context::{ContextSource, GitContextSource, LaneLock, RecoveryContext};
pub use executor::{RecoveryExecutor, RecoveryOutcome};

use lk_adapters::GitError;
use lk_core::{Remediation, WuId};
use lk_storage::{EventStoreError, LockError, Resource};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("`{action}` does not apply to {wu_id} right now (proposed: {proposed})")]
    NotApplicable { wu_id: WuId, action: ActionKind, proposed: String },
    #[error("`{action}` on {wu_id} {warning}; pass --force to proceed")]
    ForceRequired { wu_id: WuId, action: ActionKind, warning: String },
    #[error("{resource} is held by live owner {owner}")]
    LockActive { resource: Resource, owner: String },
    #[error(transparent)]
    Events(#[from] EventStoreError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Git(#[from] GitError),
}

impl Remediation for RecoveryError {
    fn next_step(&self) -> Option<String> {
        match self {
            RecoveryError::NotApplicable { wu_id, .. } => {
                Some(format!("lk recover analyze --wu {wu_id}"))
            }
            RecoveryError::ForceRequired { wu_id, action, .. } => {
                Some(format!("lk recover run --wu {wu_id} --action {action} --force"))
            }
            RecoveryError::LockActive { .. } => Some("lk lock list".to_string()),
            RecoveryError::Events(_) => Some("lk events replay".to_string()),
            RecoveryError::Lock(e) => e.next_step(),
            RecoveryError::Git(_) => None,
        }
    }
}
