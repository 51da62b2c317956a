// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lk-adapters: external collaborators (git, subprocesses)

pub mod git;
pub mod subprocess;

pub use git::{CliGit, GitAdapter, GitError, PushOutcome, WorktreeInfo};
#[cfg(any(test, feature = "test-support"))]
pub use git::FakeGit;
pub use subprocess::{run_with_timeout, SubprocessError};
