// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lk-engine: WU completion, atomic merge, recovery, and spawn monitoring

pub mod completion;
pub mod config;
mod env;
pub mod gates;
pub mod graph;
pub mod merge;
pub mod monitor;
pub mod recovery;

pub use completion::{
    CompletionContext, CompletionMachine, CompletionPipeline, CompletionReport, CompletionSnapshot,
    PipelineDeps, PipelineError, Stage, Transition, TransitionError,
};
pub use config::{Config, ConfigError};
pub use gates::{GateError, GateRunner, ShellGates};
pub use graph::{Bottleneck, CriticalPath, DependencyGraph, GraphValidation};
pub use merge::{MergeError, MergeExecutor, MergeOutcome, MergePolicy, MergeRequest, MergeWorkspace};
pub use monitor::{MonitorError, MonitorPolicy, SpawnAction, SpawnMonitor, SpawnRecovery};
pub use recovery::{
    analyze_recovery, ActionKind, ContextSource, GitContextSource, IssueCode, LaneLock,
    RecoveryAction, RecoveryAnalysis, RecoveryContext, RecoveryError, RecoveryExecutor,
    RecoveryIssue, RecoveryOutcome,
};
