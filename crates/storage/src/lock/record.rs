// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock file contents, lockable resources, and staleness policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// On-disk lock record. Presence of a valid record means the resource is held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    #[serde(alias = "wuId")]
    pub owner_id: String,
    pub lock_id: String,
    pub created_at: DateTime<Utc>,
    pub pid: u32,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Kinds of lockable resources, in global acquisition order.
///
/// Every call site that holds more than one lock must acquire them in
/// ascending [`LockKind::rank`] order: lane, then merge, then cleanup, then
/// state-store. [`super::LockSet`] does the sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    Lane,
    Merge,
    Cleanup,
    StateStore,
}

impl LockKind {
    pub fn rank(self) -> u8 {
        match self {
            LockKind::Lane => 0,
            LockKind::Merge => 1,
            LockKind::Cleanup => 2,
            LockKind::StateStore => 3,
        }
    }
}

lk_core::simple_display! {
    LockKind {
        Lane => "lane",
        Merge => "merge",
        Cleanup => "cleanup",
        StateStore => "state",
    }
}

/// A lockable resource: a kind plus a key (lane name or state-store key).
///
/// Merge and cleanup are global singletons and carry an empty key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resource {
    kind: LockKind,
    key: String,
}

impl Resource {
    pub fn lane(name: impl Into<String>) -> Self {
        Self { kind: LockKind::Lane, key: name.into() }
    }

    pub fn merge() -> Self {
        Self { kind: LockKind::Merge, key: String::new() }
    }

    pub fn cleanup() -> Self {
        Self { kind: LockKind::Cleanup, key: String::new() }
    }

    pub fn state(key: impl Into<String>) -> Self {
        Self { kind: LockKind::StateStore, key: key.into() }
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// File name under the lock directory. Keys are percent-encoded so the
    /// mapping is reversible and lane names with `/` stay in one directory.
    pub fn file_name(&self) -> String {
        if self.key.is_empty() {
            format!("{}.lock", self.kind)
        } else {
            format!("{}--{}.lock", self.kind, encode_key(&self.key))
        }
    }

    /// Inverse of [`Resource::file_name`].
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".lock")?;
        let (kind, key) = match stem.split_once("--") {
            Some((kind, key)) => (kind, decode_key(key)?),
            None => (stem, String::new()),
        };
        let kind = parse_kind(kind)?;
        match kind {
            LockKind::Merge | LockKind::Cleanup if key.is_empty() => Some(Self { kind, key }),
            LockKind::Lane | LockKind::StateStore if !key.is_empty() => Some(Self { kind, key }),
            _ => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}:{}", self.kind, self.key)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid resource `{0}` (expected lane:<name>, merge, cleanup, or state:<key>)")]
pub struct ResourceParseError(pub String);

impl FromStr for Resource {
    type Err = ResourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ResourceParseError(s.to_string());
        match s.split_once(':') {
            Some(("lane", key)) if !key.is_empty() => Ok(Resource::lane(key)),
            Some(("state", key)) if !key.is_empty() => Ok(Resource::state(key)),
            None if s == "merge" => Ok(Resource::merge()),
            None if s == "cleanup" => Ok(Resource::cleanup()),
            _ => Err(err()),
        }
    }
}

fn parse_kind(s: &str) -> Option<LockKind> {
    match s {
        "lane" => Some(LockKind::Lane),
        "merge" => Some(LockKind::Merge),
        "cleanup" => Some(LockKind::Cleanup),
        "state" => Some(LockKind::StateStore),
        _ => None,
    }
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Staleness thresholds per lock kind plus polling behaviour.
///
/// Cleanup locks guard short operations and go stale in minutes; lane locks
/// are held for a whole claim and tolerate hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockPolicy {
    pub lane_stale_after: Duration,
    pub merge_stale_after: Duration,
    pub cleanup_stale_after: Duration,
    pub state_stale_after: Duration,
    pub poll_interval: Duration,
    pub default_wait: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            lane_stale_after: Duration::from_secs(2 * 60 * 60),
            merge_stale_after: Duration::from_secs(10 * 60),
            cleanup_stale_after: Duration::from_secs(5 * 60),
            state_stale_after: Duration::from_secs(60),
            poll_interval: Duration::from_millis(250),
            default_wait: Duration::from_secs(30),
        }
    }
}

impl LockPolicy {
    pub fn stale_after(&self, kind: LockKind) -> Duration {
        match kind {
            LockKind::Lane => self.lane_stale_after,
            LockKind::Merge => self.merge_stale_after,
            LockKind::Cleanup => self.cleanup_stale_after,
            LockKind::StateStore => self.state_stale_after,
        }
    }
}
