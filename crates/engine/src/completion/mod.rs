// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WU completion: the state machine and the pipeline that drives it.

pub mod machine;
pub mod pipeline;

pub use machine::{
    CompletionContext, CompletionMachine, CompletionSnapshot, Stage, Transition, TransitionError,
};
pub use pipeline::{CompletionPipeline, CompletionReport, PipelineDeps, PipelineError};
