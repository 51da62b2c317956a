// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work unit lifecycle events.
//!
//! Events are immutable facts appended to the event log. Replaying them in
//! file order from an empty index is the only way to derive WU status.
//!
//! Serializes with `{"type": "claim", "wuId": "WU-1", "timestamp": ..., ...}`.

use crate::time_fmt::parse_rfc3339;
use crate::wu::WuId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A single field violation found while validating an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{field}`: {reason}")]
pub struct EventValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl EventValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WuEvent {
    /// WU registered with the log (created by external tooling).
    #[serde(rename_all = "camelCase")]
    Create { wu_id: WuId, lane: String, title: String, timestamp: String },

    /// Agent claimed the WU; its lane lock is held from here on.
    #[serde(rename_all = "camelCase")]
    Claim {
        wu_id: WuId,
        lane: String,
        title: String,
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worktree_path: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Block { wu_id: WuId, reason: String, timestamp: String },

    #[serde(rename_all = "camelCase")]
    Unblock { wu_id: WuId, timestamp: String },

    /// Progress note; also the liveness signal the spawn monitor reads.
    #[serde(rename_all = "camelCase")]
    Checkpoint {
        wu_id: WuId,
        note: String,
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_steps: Option<String>,
    },

    /// Claim abandoned; the WU returns to ready.
    #[serde(rename_all = "camelCase")]
    Release { wu_id: WuId, reason: String, timestamp: String },

    #[serde(rename_all = "camelCase")]
    Complete { wu_id: WuId, timestamp: String },
}

impl WuEvent {
    pub fn wu_id(&self) -> &WuId {
        match self {
            WuEvent::Create { wu_id, .. }
            | WuEvent::Claim { wu_id, .. }
            | WuEvent::Block { wu_id, .. }
            | WuEvent::Unblock { wu_id, .. }
            | WuEvent::Checkpoint { wu_id, .. }
            | WuEvent::Release { wu_id, .. }
            | WuEvent::Complete { wu_id, .. } => wu_id,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            WuEvent::Create { timestamp, .. }
            | WuEvent::Claim { timestamp, .. }
            | WuEvent::Block { timestamp, .. }
            | WuEvent::Unblock { timestamp, .. }
            | WuEvent::Checkpoint { timestamp, .. }
            | WuEvent::Release { timestamp, .. }
            | WuEvent::Complete { timestamp, .. } => timestamp,
        }
    }

    /// Parsed timestamp; `None` only for events that failed validation.
    pub fn at(&self) -> Option<DateTime<Utc>> {
        parse_rfc3339(self.timestamp())
    }

    /// The `type` tag as written to the log.
    pub fn name(&self) -> &'static str {
        match self {
            WuEvent::Create { .. } => "create",
            WuEvent::Claim { .. } => "claim",
            WuEvent::Block { .. } => "block",
            WuEvent::Unblock { .. } => "unblock",
            WuEvent::Checkpoint { .. } => "checkpoint",
            WuEvent::Release { .. } => "release",
            WuEvent::Complete { .. } => "complete",
        }
    }

    /// Check field-level constraints that serde's shape checks cannot express.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if !self.wu_id().is_well_formed() {
            return Err(EventValidationError::new(
                "wuId",
                format!("`{}` is not of the form WU-<number>", self.wu_id()),
            ));
        }
        if self.at().is_none() {
            return Err(EventValidationError::new(
                "timestamp",
                format!("`{}` is not an RFC 3339 timestamp", self.timestamp()),
            ));
        }
        match self {
            WuEvent::Create { lane, title, .. } | WuEvent::Claim { lane, title, .. } => {
                non_empty("lane", lane)?;
                non_empty("title", title)?;
            }
            WuEvent::Block { reason, .. } | WuEvent::Release { reason, .. } => {
                non_empty("reason", reason)?;
            }
            WuEvent::Checkpoint { note, .. } => non_empty("note", note)?,
            WuEvent::Unblock { .. } | WuEvent::Complete { .. } => {}
        }
        Ok(())
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), EventValidationError> {
    if value.trim().is_empty() {
        Err(EventValidationError::new(field, "must not be empty"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
