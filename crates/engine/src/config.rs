// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration: built-in defaults, then `.lanekeeper.toml` at the
//! repository root, then `LK_*` environment variables.

use crate::env;
use crate::merge::MergePolicy;
use crate::monitor::MonitorPolicy;
use lk_storage::LockPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub repo_root: PathBuf,
    pub state_dir: PathBuf,
    pub locks: LockPolicy,
    pub merge: MergePolicy,
    pub monitor: MonitorPolicy,
    /// Shell commands run in the WU worktree during the gating stage.
    pub gates: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    state_dir: Option<PathBuf>,
    remote: Option<String>,
    trunk: Option<String>,
    gates: Option<Vec<String>>,
    locks: LocksSection,
    merge: MergeSection,
    monitor: MonitorSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LocksSection {
    lane_stale_secs: Option<u64>,
    merge_stale_secs: Option<u64>,
    cleanup_stale_secs: Option<u64>,
    state_stale_secs: Option<u64>,
    wait_ms: Option<u64>,
    poll_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MergeSection {
    retries: Option<u32>,
    push_retries: Option<u32>,
    push_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MonitorSection {
    spawn_stale_secs: Option<u64>,
    checkpoint_escalate_secs: Option<u64>,
}

impl Config {
    pub const FILE_NAME: &'static str = ".lanekeeper.toml";
    const DEFAULT_STATE_DIR: &'static str = ".lanekeeper";

    /// Built-in defaults only.
    pub fn defaults(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Self {
            state_dir: repo_root.join(Self::DEFAULT_STATE_DIR),
            repo_root,
            locks: LockPolicy::default(),
            merge: MergePolicy::default(),
            monitor: MonitorPolicy::default(),
            gates: Vec::new(),
        }
    }

    /// Defaults, overlaid with the config file (if present) and the environment.
    pub fn load(repo_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::defaults(repo_root);
        let path = config.repo_root.join(Self::FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let file: FileConfig = toml::from_str(&text)
                    .map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
                config.apply_file(file);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(ConfigError::Io { path, source }),
        }
        config.apply_env();
        tracing::debug!(state_dir = %config.state_dir.display(), "configuration loaded");
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(dir) = file.state_dir {
            self.state_dir = self.repo_root.join(dir);
        }
        set(&mut self.merge.remote, file.remote);
        set(&mut self.merge.trunk, file.trunk);
        set(&mut self.gates, file.gates);

        let secs = |v: Option<u64>| v.map(std::time::Duration::from_secs);
        let millis = |v: Option<u64>| v.map(std::time::Duration::from_millis);
        set(&mut self.locks.lane_stale_after, secs(file.locks.lane_stale_secs));
        set(&mut self.locks.merge_stale_after, secs(file.locks.merge_stale_secs));
        set(&mut self.locks.cleanup_stale_after, secs(file.locks.cleanup_stale_secs));
        set(&mut self.locks.state_stale_after, secs(file.locks.state_stale_secs));
        set(&mut self.locks.default_wait, millis(file.locks.wait_ms));
        set(&mut self.locks.poll_interval, millis(file.locks.poll_ms));

        set(&mut self.merge.retries, file.merge.retries);
        set(&mut self.merge.push_retries, file.merge.push_retries);
        set(&mut self.merge.push_backoff, millis(file.merge.push_backoff_ms));

        set(&mut self.monitor.spawn_stale_after, secs(file.monitor.spawn_stale_secs));
        set(
            &mut self.monitor.checkpoint_escalate_after,
            secs(file.monitor.checkpoint_escalate_secs),
        );
    }

    fn apply_env(&mut self) {
        set(&mut self.state_dir, env::state_dir());
        set(&mut self.merge.remote, env::string("LK_REMOTE"));
        set(&mut self.merge.trunk, env::string("LK_TRUNK"));
        set(&mut self.locks.lane_stale_after, env::secs("LK_LANE_STALE_SECS"));
        set(&mut self.locks.merge_stale_after, env::secs("LK_MERGE_STALE_SECS"));
        set(&mut self.locks.cleanup_stale_after, env::secs("LK_CLEANUP_STALE_SECS"));
        set(&mut self.locks.state_stale_after, env::secs("LK_STATE_STALE_SECS"));
        set(&mut self.locks.default_wait, env::millis("LK_LOCK_WAIT_MS"));
        set(&mut self.merge.retries, env::u32("LK_MERGE_RETRIES"));
        set(&mut self.merge.push_retries, env::u32("LK_PUSH_RETRIES"));
        set(&mut self.monitor.spawn_stale_after, env::secs("LK_SPAWN_STALE_SECS"));
        set(&mut self.monitor.checkpoint_escalate_after, env::secs("LK_CHECKPOINT_ESCALATE_SECS"));
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.state_dir.join("locks")
    }

    pub fn events_path(&self) -> PathBuf {
        self.state_dir.join("wu-events.jsonl")
    }

    pub fn spawns_path(&self) -> PathBuf {
        self.state_dir.join("spawns.jsonl")
    }

    /// Recovery audit records.
    pub fn audit_dir(&self) -> PathBuf {
        self.state_dir.join("recovery")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.state_dir.join("snapshots")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Temporary merge and rebase worktrees.
    pub fn scratch_dir(&self) -> PathBuf {
        self.state_dir.join("tmp")
    }

    /// Default location of a lane worktree for a WU.
    pub fn worktree_path(&self, branch: &str) -> PathBuf {
        self.repo_root.join("worktrees").join(branch.replace('/', "-"))
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
