// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work units: identifier, status, and the data the coordination core reads.
//!
//! A work unit is created externally; the coordination core only reads its
//! lane, branch, worktree, and blocking edges. Status is never stored here as
//! a separate source of truth; the event log's replayed index owns it, and a
//! `WorkUnit` snapshot is just a convenient carrier.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Work unit identifier, e.g. `WU-1042`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WuId(SmolStr);

impl WuId {
    pub const PREFIX: &'static str = "WU-";

    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `WU-` followed by one or more ASCII digits.
    pub fn is_well_formed(&self) -> bool {
        self.0
            .strip_prefix(Self::PREFIX)
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }
}

impl fmt::Display for WuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WuId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WuId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::borrow::Borrow<str> for WuId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for WuId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Lifecycle status of a work unit.
///
/// Older WU files use different spellings; those deserialize to the
/// canonical variant through serde aliases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WuStatus {
    #[default]
    #[serde(alias = "todo", alias = "backlog")]
    Ready,
    #[serde(alias = "in-progress", alias = "claimed")]
    InProgress,
    Blocked,
    Waiting,
    #[serde(alias = "completed")]
    Done,
    #[serde(alias = "abandoned")]
    Cancelled,
}

impl WuStatus {
    /// Done and cancelled WUs are retired; nothing transitions out of them.
    pub fn is_terminal(self) -> bool {
        matches!(self, WuStatus::Done | WuStatus::Cancelled)
    }

    /// Claimed and not yet retired (in progress, blocked, or waiting).
    pub fn is_claimed(self) -> bool {
        matches!(self, WuStatus::InProgress | WuStatus::Blocked | WuStatus::Waiting)
    }
}

crate::simple_display! {
    WuStatus {
        Ready => "ready",
        InProgress => "in_progress",
        Blocked => "blocked",
        Waiting => "waiting",
        Done => "done",
        Cancelled => "cancelled",
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown WU status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for WuStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ready" | "todo" | "backlog" => Ok(WuStatus::Ready),
            "in_progress" | "in-progress" | "claimed" => Ok(WuStatus::InProgress),
            "blocked" => Ok(WuStatus::Blocked),
            "waiting" => Ok(WuStatus::Waiting),
            "done" | "completed" => Ok(WuStatus::Done),
            "cancelled" | "abandoned" => Ok(WuStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A work unit as seen by the coordination core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: WuId,
    #[serde(default)]
    pub status: WuStatus,
    #[serde(default)]
    pub lane: String,
    #[serde(default)]
    pub title: String,
    /// Absent in branch-only mode.
    #[serde(default, alias = "worktreePath", skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    #[serde(default, alias = "claimedBranch", skip_serializing_if = "Option::is_none")]
    pub claimed_branch: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub blocks: BTreeSet<WuId>,
    #[serde(default, alias = "blockedBy", skip_serializing_if = "BTreeSet::is_empty")]
    pub blocked_by: BTreeSet<WuId>,
}

impl WorkUnit {
    /// Branch name used when the WU does not record a claimed branch.
    pub fn branch_name(&self) -> String {
        self.claimed_branch.clone().unwrap_or_else(|| lane_branch_name(&self.lane, &self.id))
    }
}

/// Conventional lane branch: `lane/<lane-slug>/<wu-id-lowercase>`.
pub fn lane_branch_name(lane: &str, id: &WuId) -> String {
    let slug: String = lane
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.split('-').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("-");
    format!("lane/{}/{}", slug, id.as_str().to_ascii_lowercase())
}

/// Test builder for [`WorkUnit`]: a ready `WU-1` in lane `Core`.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub struct WorkUnitBuilder(WorkUnit);

#[cfg(any(test, feature = "test-support"))]
impl WorkUnitBuilder {
    pub fn id(mut self, id: impl Into<WuId>) -> Self {
        self.0.id = id.into();
        self
    }

    pub fn lane(mut self, lane: impl Into<String>) -> Self {
        self.0.lane = lane.into();
        self
    }

    pub fn status(mut self, status: WuStatus) -> Self {
        self.0.status = status;
        self
    }

    pub fn blocks(mut self, ids: BTreeSet<WuId>) -> Self {
        self.0.blocks = ids;
        self
    }

    pub fn blocked_by(mut self, ids: BTreeSet<WuId>) -> Self {
        self.0.blocked_by = ids;
        self
    }

    pub fn worktree_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.0.worktree_path = Some(path.into());
        self
    }

    pub fn claimed_branch(mut self, branch: impl Into<String>) -> Self {
        self.0.claimed_branch = Some(branch.into());
        self
    }

    pub fn build(self) -> WorkUnit {
        self.0
    }
}

#[cfg(any(test, feature = "test-support"))]
impl WorkUnit {
    pub fn builder() -> WorkUnitBuilder {
        WorkUnitBuilder(WorkUnit {
            id: WuId::from("WU-1"),
            status: WuStatus::Ready,
            lane: "Core".to_string(),
            title: "test work unit".to_string(),
            worktree_path: None,
            claimed_branch: None,
            blocks: BTreeSet::new(),
            blocked_by: BTreeSet::new(),
        })
    }
}

#[cfg(test)]
#[path = "wu_tests.rs"]
mod tests;
