// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring from configuration to engine components.

use crate::output::OutputFormat;
use lk_adapters::{CliGit, GitAdapter};
use lk_core::SystemClock;
use lk_engine::{
    CompletionPipeline, Config, GitContextSource, MergeExecutor, PipelineDeps, RecoveryExecutor,
    ShellGates, SpawnMonitor,
};
use lk_storage::{AuditLog, EventStore, LockManager, SnapshotStore, SpawnRegistry};
use std::sync::Arc;

pub struct App {
    pub config: Config,
    pub format: OutputFormat,
}

impl App {
    pub fn new(config: Config, format: OutputFormat) -> Self {
        Self { config, format }
    }

    pub fn locks(&self) -> LockManager {
        LockManager::new(self.config.lock_dir(), self.config.locks.clone())
    }

    pub fn events(&self) -> EventStore {
        EventStore::new(self.config.events_path())
    }

    pub fn registry(&self) -> SpawnRegistry {
        SpawnRegistry::new(self.config.spawns_path())
    }

    pub fn git(&self) -> Arc<dyn GitAdapter> {
        Arc::new(CliGit::new(self.config.repo_root()))
    }

    pub fn merge_executor(&self) -> MergeExecutor {
        MergeExecutor::new(self.git(), self.config.merge.clone(), self.config.scratch_dir())
    }

    /// The lane lock taken by the pipeline records `agent_pid`, so it stays
    /// valid after `lk` exits for as long as the agent lives.
    pub fn pipeline(&self, agent_pid: u32) -> CompletionPipeline {
        CompletionPipeline::new(PipelineDeps {
            git: self.git(),
            gates: Arc::new(ShellGates::new(self.config.gates.clone())),
            locks: self.locks(),
            events: self.events(),
            snapshots: SnapshotStore::new(self.config.snapshots_dir()),
            merge: self.merge_executor(),
            clock: SystemClock,
            repo_root: self.config.repo_root().to_path_buf(),
            lane_pid: Some(agent_pid),
        })
    }

    pub fn recovery(&self) -> RecoveryExecutor {
        let source = GitContextSource::new(
            self.git(),
            self.events(),
            self.locks(),
            self.config.merge.remote.clone(),
            self.config.merge.trunk.clone(),
        );
        RecoveryExecutor::new(
            self.git(),
            Arc::new(source),
            self.events(),
            self.locks(),
            SystemClock,
        )
    }

    pub fn monitor(&self) -> SpawnMonitor {
        SpawnMonitor::new(
            self.locks(),
            self.registry(),
            self.events(),
            AuditLog::new(self.config.audit_dir()),
            self.config.monitor.clone(),
            SystemClock,
        )
    }
}
