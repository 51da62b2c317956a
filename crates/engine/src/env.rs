// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.
//!
//! Unparseable values are ignored (with a warning) so a typo falls back to
//! the file or built-in default instead of aborting an agent mid-pipeline.

use std::path::PathBuf;
use std::time::Duration;

/// `LK_STATE_DIR`, if set.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var_os("LK_STATE_DIR").filter(|v| !v.is_empty()).map(PathBuf::from)
}

pub fn string(var: &str) -> Option<String> {
    std::env::var(var).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn u32(var: &str) -> Option<u32> {
    parse(var)
}

pub fn secs(var: &str) -> Option<Duration> {
    parse::<u64>(var).map(Duration::from_secs)
}

pub fn millis(var: &str) -> Option<Duration> {
    parse::<u64>(var).map(Duration::from_millis)
}

fn parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = string(var)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}
