// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sub-agent monitor: finds delegated work whose agent died or stalled.
//!
//! Checks run in strict priority order against the lane lock held for the
//! spawn's target WU:
//!
//! 1. zombie lock (holder pid is dead): release, mark `crashed`
//! 2. stale lock (older than `spawn_stale_after`): release, mark `timeout`
//! 3. live lock but no checkpoint within `checkpoint_escalate_after`:
//!    audit only, the lock stays
//! 4. otherwise healthy
//!
//! Every branch that acts writes an audit record before returning.

use lk_core::{Clock, Remediation, SpawnId, SpawnRecord, SpawnStatus, SystemClock};
use lk_storage::{
    AuditError, AuditLog, AuditRecord, EventStore, EventStoreError, LockError, LockManager,
    LockRecord, LockStatus, Resource, SpawnRegistry, SpawnRegistryError, WuIndex,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorPolicy {
    /// Lane lock age after which a spawn is considered timed out.
    pub spawn_stale_after: Duration,
    /// Silence (no checkpoint) after which a live spawn is escalated.
    pub checkpoint_escalate_after: Duration,
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self {
            spawn_stale_after: Duration::from_secs(2 * 60 * 60),
            checkpoint_escalate_after: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("spawn {0} is not registered")]
    NotFound(SpawnId),
    #[error(transparent)]
    Registry(#[from] SpawnRegistryError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Events(#[from] EventStoreError),
    #[error("failed to write audit record: {0}")]
    Audit(#[from] AuditError),
}

impl Remediation for MonitorError {
    fn next_step(&self) -> Option<String> {
        match self {
            MonitorError::NotFound(_) => Some("lk spawn list".to_string()),
            MonitorError::Lock(e) => e.next_step(),
            MonitorError::Events(_) => Some("lk events replay".to_string()),
            MonitorError::Registry(_) | MonitorError::Audit(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnAction {
    ReleasedZombie,
    ReleasedStale,
    EscalatedStuck,
    None,
}

lk_core::simple_display! {
    SpawnAction {
        ReleasedZombie => "released_zombie",
        ReleasedStale => "released_stale",
        EscalatedStuck => "escalated_stuck",
        None => "none",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRecovery {
    pub spawn_id: SpawnId,
    /// The lock was released and the spawn moved to a terminal status.
    pub recovered: bool,
    pub action: SpawnAction,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_path: Option<PathBuf>,
}

impl SpawnRecovery {
    fn healthy(spawn_id: &SpawnId, reason: impl Into<String>) -> Self {
        Self {
            spawn_id: spawn_id.clone(),
            recovered: false,
            action: SpawnAction::None,
            reason: reason.into(),
            audit_path: None,
        }
    }
}

pub struct SpawnMonitor<C: Clock = SystemClock> {
    locks: LockManager<C>,
    registry: SpawnRegistry,
    events: EventStore,
    audit: AuditLog,
    policy: MonitorPolicy,
    clock: C,
}

impl<C: Clock> SpawnMonitor<C> {
    pub fn new(
        locks: LockManager<C>,
        registry: SpawnRegistry,
        events: EventStore,
        audit: AuditLog,
        policy: MonitorPolicy,
        clock: C,
    ) -> Self {
        Self { locks, registry, events, audit, policy, clock }
    }

    pub fn registry(&self) -> &SpawnRegistry {
        &self.registry
    }

    /// Evaluate one spawn and apply the first matching recovery.
    pub fn recover_stuck_spawn(&self, spawn_id: &SpawnId) -> Result<SpawnRecovery, MonitorError> {
        let spawn = self
            .registry
            .get(spawn_id)?
            .ok_or_else(|| MonitorError::NotFound(spawn_id.clone()))?;
        let index = self.current_index()?;
        self.evaluate(&spawn, &index)
    }

    /// Evaluate every pending spawn. A spawn that errors is logged and skipped.
    pub fn sweep(&self) -> Result<Vec<SpawnRecovery>, MonitorError> {
        let pending = self.registry.pending()?;
        let index = self.current_index()?;
        let mut outcomes = Vec::with_capacity(pending.len());
        for spawn in &pending {
            match self.evaluate(spawn, &index) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(spawn_id = %spawn.id, error = %e, "spawn check failed"),
            }
        }
        let recovered = outcomes.iter().filter(|o| o.recovered).count();
        info!(checked = pending.len(), recovered, "spawn sweep done");
        Ok(outcomes)
    }

    fn current_index(&self) -> Result<WuIndex, MonitorError> {
        let events = self.events.read_events()?;
        Ok(WuIndex::replay(&events))
    }

    fn evaluate(
        &self,
        spawn: &SpawnRecord,
        index: &WuIndex,
    ) -> Result<SpawnRecovery, MonitorError> {
        if spawn.status.is_terminal() {
            let reason = format!("spawn is already {}", spawn.status);
            return Ok(SpawnRecovery::healthy(&spawn.id, reason));
        }
        let resource = Resource::lane(&spawn.lane);
        let status = self.locks.inspect(&resource)?;
        let Some(record) = status.record().cloned() else {
            return Ok(SpawnRecovery::healthy(&spawn.id, format!("no lock held on {resource}")));
        };
        if record.owner_id != spawn.target_wu_id.as_str() {
            return Ok(SpawnRecovery::healthy(
                &spawn.id,
                format!("{resource} is held by {}, not {}", record.owner_id, spawn.target_wu_id),
            ));
        }

        if matches!(status, LockStatus::Zombie(_)) {
            let reason =
                format!("lock holder pid {} on {} is not running", record.pid, record.hostname);
            return self.release(
                spawn,
                &resource,
                record,
                SpawnStatus::Crashed,
                SpawnAction::ReleasedZombie,
                reason,
            );
        }

        let age = self.locks.age(&record);
        if age > self.policy.spawn_stale_after {
            let reason = format!(
                "lock is {} old (limit {})",
                lk_core::format_elapsed(age.as_secs()),
                lk_core::format_elapsed(self.policy.spawn_stale_after.as_secs())
            );
            return self.release(
                spawn,
                &resource,
                record,
                SpawnStatus::Timeout,
                SpawnAction::ReleasedStale,
                reason,
            );
        }

        let last = index
            .get(spawn.target_wu_id.as_str())
            .and_then(|entry| entry.last_activity())
            .unwrap_or(spawn.spawned_at)
            .max(spawn.spawned_at);
        let silent = self.clock.since(last);
        if silent > self.policy.checkpoint_escalate_after {
            let reason = format!(
                "no checkpoint from {} for {}; lock left in place",
                spawn.target_wu_id,
                lk_core::format_elapsed(silent.as_secs())
            );
            let path = self.audit(spawn, SpawnAction::EscalatedStuck, &reason, Some(record))?;
            warn!(spawn_id = %spawn.id, wu_id = %spawn.target_wu_id, %reason, "spawn escalated");
            return Ok(SpawnRecovery {
                spawn_id: spawn.id.clone(),
                recovered: false,
                action: SpawnAction::EscalatedStuck,
                reason,
                audit_path: Some(path),
            });
        }

        Ok(SpawnRecovery::healthy(&spawn.id, "lock is live and checkpoints are recent"))
    }

    fn release(
        &self,
        spawn: &SpawnRecord,
        resource: &Resource,
        record: LockRecord,
        status: SpawnStatus,
        action: SpawnAction,
        reason: String,
    ) -> Result<SpawnRecovery, MonitorError> {
        // Only the record we judged; a lock replaced meanwhile stays.
        if !self.locks.release(resource, &record.lock_id)? {
            let reason = format!("{resource} changed while being checked");
            return Ok(SpawnRecovery::healthy(&spawn.id, reason));
        }
        // The audit record goes first so a failed registry update still
        // leaves a trace of the release.
        let path = self.audit(spawn, action, &reason, Some(record))?;
        if let Err(e) = self.registry.finish(&spawn.id, status, self.clock.utc()) {
            warn!(
                spawn_id = %spawn.id,
                audit = %path.display(),
                error = %e,
                "lock released but spawn status not updated"
            );
            return Err(e.into());
        }
        warn!(
            spawn_id = %spawn.id,
            wu_id = %spawn.target_wu_id,
            %action,
            %reason,
            "spawn recovered"
        );
        Ok(SpawnRecovery {
            spawn_id: spawn.id.clone(),
            recovered: true,
            action,
            reason,
            audit_path: Some(path),
        })
    }

    fn audit(
        &self,
        spawn: &SpawnRecord,
        action: SpawnAction,
        reason: &str,
        lock: Option<LockRecord>,
    ) -> Result<PathBuf, MonitorError> {
        let record = AuditRecord {
            timestamp: self.clock.utc(),
            spawn_id: spawn.id.clone(),
            parent_wu_id: spawn.parent_wu_id.clone(),
            target_wu_id: spawn.target_wu_id.clone(),
            lane: spawn.lane.clone(),
            action: action.to_string(),
            reason: reason.to_string(),
            lock,
        };
        Ok(self.audit.write(&record)?)
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
