// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of delegated sub-agent spawns.
//!
//! Stored as JSONL of full [`SpawnRecord`]s. Updates append a new copy of
//! the record; on read the last line for each id wins.

use fs2::FileExt;
use indexmap::IndexMap;
use lk_core::{SpawnId, SpawnRecord, SpawnStatus, SpawnTransitionError};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SpawnRegistryError {
    #[error("spawn registry I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}:{line}: invalid spawn record: {source}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode spawn record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("unknown spawn {0}")]
    NotFound(SpawnId),
    #[error(transparent)]
    Transition(#[from] SpawnTransitionError),
}

impl lk_core::Remediation for SpawnRegistryError {
    fn next_step(&self) -> Option<String> {
        match self {
            SpawnRegistryError::NotFound(_) | SpawnRegistryError::Transition(_) => {
                Some("lk spawn list".to_string())
            }
            SpawnRegistryError::Io { .. }
            | SpawnRegistryError::Parse { .. }
            | SpawnRegistryError::Encode(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpawnRegistry {
    path: PathBuf,
}

impl SpawnRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn register(&self, record: &SpawnRecord) -> Result<(), SpawnRegistryError> {
        self.append(record)?;
        info!(
            spawn_id = %record.id,
            parent = %record.parent_wu_id,
            target = %record.target_wu_id,
            lane = %record.lane,
            "spawn registered"
        );
        Ok(())
    }

    /// Current records in first-registration order.
    pub fn all(&self) -> Result<Vec<SpawnRecord>, SpawnRegistryError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io(e)),
        };
        file.lock_shared().map_err(|e| self.io(e))?;
        let contents = io::read_to_string(&file);
        if let Err(e) = FileExt::unlock(&file) {
            warn!(path = %self.path.display(), error = %e, "failed to unlock");
        }
        let contents = contents.map_err(|e| self.io(e))?;

        let mut latest: IndexMap<SpawnId, SpawnRecord> = IndexMap::new();
        for (idx, raw) in contents.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            let record: SpawnRecord = serde_json::from_str(raw).map_err(|source| {
                SpawnRegistryError::Parse { path: self.path.clone(), line: idx + 1, source }
            })?;
            latest.insert(record.id.clone(), record);
        }
        Ok(latest.into_values().collect())
    }

    pub fn get(&self, id: &SpawnId) -> Result<Option<SpawnRecord>, SpawnRegistryError> {
        Ok(self.all()?.into_iter().find(|r| &r.id == id))
    }

    pub fn pending(&self) -> Result<Vec<SpawnRecord>, SpawnRegistryError> {
        Ok(self.all()?.into_iter().filter(|r| r.status == SpawnStatus::Pending).collect())
    }

    /// Move a pending spawn to a terminal status and persist it.
    pub fn finish(
        &self,
        id: &SpawnId,
        status: SpawnStatus,
        at: DateTime<Utc>,
    ) -> Result<SpawnRecord, SpawnRegistryError> {
        let mut record = self.get(id)?.ok_or_else(|| SpawnRegistryError::NotFound(id.clone()))?;
        record.finish(status, at)?;
        self.append(&record)?;
        info!(spawn_id = %id, %status, "spawn finished");
        Ok(record)
    }

    fn append(&self, record: &SpawnRecord) -> Result<(), SpawnRegistryError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }
        let mut file =
            OpenOptions::new().create(true).append(true).open(&self.path).map_err(|e| self.io(e))?;
        file.lock_exclusive().map_err(|e| self.io(e))?;
        let written = file.write_all(line.as_bytes()).and_then(|()| file.sync_data());
        if let Err(e) = FileExt::unlock(&file) {
            warn!(path = %self.path.display(), error = %e, "failed to unlock");
        }
        written.map_err(|e| self.io(e))
    }

    fn io(&self, source: io::Error) -> SpawnRegistryError {
        SpawnRegistryError::Io { path: self.path.clone(), source }
    }
}

#[cfg(test)]
#[path = "spawn_registry_tests.rs"]
mod tests;
