// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lk-storage: on-disk state shared between agent processes
//!
//! Everything here is coordinated through the filesystem: lock files, the
//! append-only WU event log, the spawn registry, completion snapshots, and
//! recovery audit records.

pub mod audit;
pub mod event_log;
pub mod index;
pub mod lock;
pub mod snapshot;
pub mod spawn_registry;

pub use audit::{AuditError, AuditLog, AuditRecord};
pub use event_log::{EventStore, EventStoreError};
pub use index::{Checkpoint, WuEntry, WuIndex};
pub use lock::{
    AcquireOptions, Acquisition, LockError, LockGuard, LockKind, LockManager, LockPolicy,
    LockRecord, LockSet, LockStatus, Resource,
};
pub use snapshot::{SnapshotError, SnapshotStore};
pub use spawn_registry::{SpawnRegistry, SpawnRegistryError};
