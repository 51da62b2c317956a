// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WU index materialized from event log replay

use chrono::{DateTime, Utc};
use lk_core::{WuEvent, WuId, WuStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Most recent checkpoint recorded for a WU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub note: String,
    pub at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
}

/// Current state of one WU as derived from its events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WuEntry {
    pub id: WuId,
    pub status: WuStatus,
    pub lane: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checkpoint: Option<Checkpoint>,
    /// Time of the latest event of any kind for this WU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WuEntry {
    fn new(id: WuId) -> Self {
        Self {
            id,
            status: WuStatus::Ready,
            lane: String::new(),
            title: String::new(),
            worktree_path: None,
            branch: None,
            claimed_at: None,
            completed_at: None,
            blocked_reason: None,
            last_checkpoint: None,
            updated_at: None,
        }
    }

    /// Last sign of life: newest checkpoint, else the claim time.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_checkpoint.as_ref().and_then(|c| c.at).or(self.claimed_at)
    }
}

/// WU state keyed by id, built by replaying the event log in order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WuIndex {
    entries: BTreeMap<WuId, WuEntry>,
    events_applied: u64,
}

impl WuIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from an ordered event sequence.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a WuEvent>) -> Self {
        let mut index = Self::new();
        for event in events {
            index.apply_event(event);
        }
        index
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.events_applied = 0;
    }

    /// Apply one event. Never fails: validation happens before events are
    /// written or read, so replay cannot stop half way.
    ///
    /// Retired WUs (done, cancelled) keep their status; later events for
    /// them only refresh checkpoints and timestamps.
    pub fn apply_event(&mut self, event: &WuEvent) {
        self.events_applied += 1;
        let at = event.at();
        let entry = self
            .entries
            .entry(event.wu_id().clone())
            .or_insert_with(|| WuEntry::new(event.wu_id().clone()));
        entry.updated_at = at.or(entry.updated_at);
        let retired = entry.status.is_terminal();

        match event {
            WuEvent::Create { lane, title, .. } => {
                if entry.lane.is_empty() {
                    entry.lane = lane.clone();
                }
                if entry.title.is_empty() {
                    entry.title = title.clone();
                }
            }
            WuEvent::Claim { lane, title, worktree_path, branch, .. } => {
                entry.lane = lane.clone();
                entry.title = title.clone();
                if !retired {
                    entry.status = WuStatus::InProgress;
                    entry.worktree_path = worktree_path.clone();
                    entry.branch = branch.clone();
                    entry.claimed_at = at;
                    entry.blocked_reason = None;
                }
            }
            WuEvent::Block { reason, .. } => {
                if !retired {
                    entry.status = WuStatus::Blocked;
                    entry.blocked_reason = Some(reason.clone());
                }
            }
            WuEvent::Unblock { .. } => {
                if entry.status == WuStatus::Blocked {
                    entry.status = WuStatus::InProgress;
                }
                entry.blocked_reason = None;
            }
            WuEvent::Checkpoint { note, next_steps, .. } => {
                entry.last_checkpoint =
                    Some(Checkpoint { note: note.clone(), at, next_steps: next_steps.clone() });
            }
            WuEvent::Release { .. } => {
                if !retired {
                    entry.status = WuStatus::Ready;
                    entry.worktree_path = None;
                    entry.branch = None;
                    entry.claimed_at = None;
                    entry.blocked_reason = None;
                }
            }
            WuEvent::Complete { .. } => {
                if !retired {
                    entry.status = WuStatus::Done;
                    entry.completed_at = at;
                    entry.blocked_reason = None;
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&WuEntry> {
        self.entries.get(id)
    }

    pub fn status(&self, id: &str) -> Option<WuStatus> {
        self.get(id).map(|e| e.status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WuEntry> {
        self.entries.values()
    }

    pub fn with_status(&self, status: WuStatus) -> impl Iterator<Item = &WuEntry> {
        self.entries.values().filter(move |e| e.status == status)
    }

    /// Claimed WUs currently on `lane`.
    pub fn claimed_in_lane<'a>(&'a self, lane: &'a str) -> impl Iterator<Item = &'a WuEntry> {
        self.entries.values().filter(move |e| e.lane == lane && e.status.is_claimed())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
