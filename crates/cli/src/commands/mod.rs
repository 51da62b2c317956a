// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod complete;
pub mod events;
pub mod graph;
pub mod lock;
pub mod merge;
pub mod recover;
pub mod spawn;

use crate::app::App;
use crate::exit_error::{ExitError, FAILED};
use lk_core::WuId;
use lk_storage::WuEntry;

/// Current state of `wu_id` from a fresh replay of the event log.
pub(crate) fn wu_entry(app: &App, wu_id: &WuId) -> anyhow::Result<WuEntry> {
    let events = app.events().read_events()?;
    lk_storage::WuIndex::replay(&events).get(wu_id.as_str()).cloned().ok_or_else(|| {
        ExitError::new(FAILED, format!("{wu_id} has no events"))
            .with_next(Some("lk events replay".to_string()))
            .into()
    })
}
