// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::event::WuEvent;
use crate::wu::WuId;

/// Fixed timestamp used by the event factories.
pub const TS: &str = "2026-01-01T00:00:00.000Z";

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for event sequences.
pub mod strategies {
    use crate::event::WuEvent;
    use proptest::prelude::*;

    fn arb_wu_id() -> impl Strategy<Value = String> {
        (1u32..6).prop_map(|n| format!("WU-{}", n))
    }

    fn arb_timestamp() -> impl Strategy<Value = String> {
        (0u32..60).prop_map(|m| format!("2026-01-01T00:{:02}:00.000Z", m))
    }

    pub fn arb_event() -> impl Strategy<Value = WuEvent> {
        (arb_wu_id(), arb_timestamp(), 0u8..7, "[a-z]{1,8}").prop_map(|(id, ts, kind, text)| {
            let wu_id = id.as_str().into();
            match kind {
                0 => WuEvent::Create { wu_id, lane: text.clone(), title: text, timestamp: ts },
                1 => WuEvent::Claim {
                    wu_id,
                    lane: text.clone(),
                    title: text,
                    timestamp: ts,
                    worktree_path: None,
                    branch: None,
                },
                2 => WuEvent::Block { wu_id, reason: text, timestamp: ts },
                3 => WuEvent::Unblock { wu_id, timestamp: ts },
                4 => WuEvent::Checkpoint { wu_id, note: text, timestamp: ts, next_steps: None },
                5 => WuEvent::Release { wu_id, reason: text, timestamp: ts },
                _ => WuEvent::Complete { wu_id, timestamp: ts },
            }
        })
    }

    pub fn arb_event_log() -> impl Strategy<Value = Vec<WuEvent>> {
        prop::collection::vec(arb_event(), 0..40)
    }
}

// ── Event factory functions ─────────────────────────────────────────────────

pub fn create_event(id: &str, lane: &str) -> WuEvent {
    WuEvent::Create {
        wu_id: WuId::from(id),
        lane: lane.to_string(),
        title: format!("{} title", id),
        timestamp: TS.to_string(),
    }
}

pub fn claim_event(id: &str, lane: &str) -> WuEvent {
    WuEvent::Claim {
        wu_id: WuId::from(id),
        lane: lane.to_string(),
        title: format!("{} title", id),
        timestamp: TS.to_string(),
        worktree_path: None,
        branch: None,
    }
}

pub fn checkpoint_event(id: &str, note: &str) -> WuEvent {
    WuEvent::Checkpoint {
        wu_id: WuId::from(id),
        note: note.to_string(),
        timestamp: TS.to_string(),
        next_steps: None,
    }
}

pub fn block_event(id: &str, reason: &str) -> WuEvent {
    WuEvent::Block { wu_id: WuId::from(id), reason: reason.to_string(), timestamp: TS.to_string() }
}

pub fn unblock_event(id: &str) -> WuEvent {
    WuEvent::Unblock { wu_id: WuId::from(id), timestamp: TS.to_string() }
}

pub fn release_event(id: &str) -> WuEvent {
    WuEvent::Release {
        wu_id: WuId::from(id),
        reason: "released".to_string(),
        timestamp: TS.to_string(),
    }
}

pub fn complete_event(id: &str) -> WuEvent {
    WuEvent::Complete { wu_id: WuId::from(id), timestamp: TS.to_string() }
}

/// Replace an event's timestamp (factories all use [`TS`]).
pub fn at(mut event: WuEvent, ts: &str) -> WuEvent {
    match &mut event {
        WuEvent::Create { timestamp, .. }
        | WuEvent::Claim { timestamp, .. }
        | WuEvent::Block { timestamp, .. }
        | WuEvent::Unblock { timestamp, .. }
        | WuEvent::Checkpoint { timestamp, .. }
        | WuEvent::Release { timestamp, .. }
        | WuEvent::Complete { timestamp, .. } => *timestamp = ts.to_string(),
    }
    event
}
