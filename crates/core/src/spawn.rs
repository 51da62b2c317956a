// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delegation records: work handed from a parent WU to a sub-agent.

use crate::wu::WuId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use thiserror::Error;

/// Identifier of a delegated sub-agent run: `spn-` plus a random token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpawnId(SmolStr);

impl SpawnId {
    pub const PREFIX: &'static str = "spn-";

    pub fn new() -> Self {
        Self(SmolStr::new(format!("{}{}", Self::PREFIX, crate::id::token(16))))
    }

    pub fn from_string(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SpawnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpawnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpawnId {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

/// Status of a spawn. Anything other than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnStatus {
    Pending,
    Completed,
    Timeout,
    Crashed,
}

impl SpawnStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SpawnStatus::Pending)
    }
}

crate::simple_display! {
    SpawnStatus {
        Pending => "pending",
        Completed => "completed",
        Timeout => "timeout",
        Crashed => "crashed",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("spawn {id} is already {status}; terminal spawns cannot transition")]
pub struct SpawnTransitionError {
    pub id: SpawnId,
    pub status: SpawnStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRecord {
    pub id: SpawnId,
    pub parent_wu_id: WuId,
    pub target_wu_id: WuId,
    pub lane: String,
    pub spawned_at: DateTime<Utc>,
    pub status: SpawnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SpawnRecord {
    pub fn new(
        parent_wu_id: WuId,
        target_wu_id: WuId,
        lane: impl Into<String>,
        spawned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SpawnId::new(),
            parent_wu_id,
            target_wu_id,
            lane: lane.into(),
            spawned_at,
            status: SpawnStatus::Pending,
            completed_at: None,
        }
    }

    /// Move out of `Pending`. Fails once the record is terminal.
    pub fn finish(
        &mut self,
        status: SpawnStatus,
        at: DateTime<Utc>,
    ) -> Result<(), SpawnTransitionError> {
        if self.status.is_terminal() {
            return Err(SpawnTransitionError { id: self.id.clone(), status: self.status });
        }
        self.status = status;
        if status.is_terminal() {
            self.completed_at = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
