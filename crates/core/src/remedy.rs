// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// An error that knows which command should be run next.
pub trait Remediation {
    /// A ready-to-run command, or `None` when no single command helps.
    fn next_step(&self) -> Option<String>;
}
