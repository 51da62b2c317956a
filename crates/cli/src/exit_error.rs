// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type that carries a process exit code and the command to run next.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use lk_core::Remediation;
use std::fmt;

/// Generic failure.
pub const FAILED: i32 = 1;
/// A lock or lane is held by someone else.
pub const CONTENDED: i32 = 3;
/// A check found problems (cycles, recovery issues).
pub const NEEDS_ATTENTION: i32 = 4;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
    pub next: Option<String>,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), next: None }
    }

    pub fn with_next(mut self, next: Option<String>) -> Self {
        self.next = next;
        self
    }

    /// Wrap a library error, keeping its remediation hint.
    pub fn from_remediable<E: std::error::Error + Remediation>(err: E) -> Self {
        let next = err.next_step();
        Self { code: FAILED, message: err.to_string(), next }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

/// Shorthand for `map_err(ExitError::from_remediable)`.
pub fn remediable<E: std::error::Error + Remediation>(err: E) -> anyhow::Error {
    ExitError::from_remediable(err).into()
}

/// Text printed to stderr for a failed command, and its exit code.
pub fn render(err: &anyhow::Error) -> (String, i32) {
    match err.downcast_ref::<ExitError>() {
        Some(exit) => {
            let mut text = format!("error: {}", exit.message);
            if let Some(next) = &exit.next {
                text.push_str(&format!("\nnext: {next}"));
            }
            (text, exit.code)
        }
        None => (format!("error: {err:#}"), FAILED),
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
