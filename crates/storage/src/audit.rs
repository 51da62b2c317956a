// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable audit trail for automated recovery decisions.
//!
//! One JSON file per decision, named `<spawn-id>-<timestamp>.json`. Files
//! are created with `create_new` and never rewritten or deleted here.

use crate::lock::LockRecord;
use chrono::{DateTime, Utc};
use lk_core::{SpawnId, WuId};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const MAX_SUFFIX: u32 = 1000;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub spawn_id: SpawnId,
    pub parent_wu_id: WuId,
    pub target_wu_id: WuId,
    pub lane: String,
    pub action: String,
    pub reason: String,
    /// Lock as observed when the decision was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockRecord>,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a record and return its path. Never overwrites: a name
    /// collision within the same millisecond gets a numeric suffix.
    pub fn write(&self, record: &AuditRecord) -> Result<PathBuf, AuditError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let bytes = serde_json::to_vec_pretty(record)?;
        let stem = format!("{}-{}", record.spawn_id, record.timestamp.format("%Y%m%dT%H%M%S%.3fZ"));

        for n in 0..MAX_SUFFIX {
            let name = if n == 0 { format!("{stem}.json") } else { format!("{stem}-{n}.json") };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&bytes)
                        .and_then(|()| file.sync_all())
                        .map_err(|e| io_err(&path, e))?;
                    info!(
                        spawn_id = %record.spawn_id,
                        action = %record.action,
                        path = %path.display(),
                        "audit record written"
                    );
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_err(&path, e)),
            }
        }
        let exhausted = format!("too many audit records named {stem}");
        Err(io_err(&self.dir, io::Error::new(io::ErrorKind::AlreadyExists, exhausted)))
    }

    /// All records, oldest first.
    pub fn list(&self) -> Result<Vec<AuditRecord>, AuditError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.dir, e)),
        };
        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let bytes = fs::read(&path).map_err(|e| io_err(&path, e))?;
                records.push(serde_json::from_slice::<AuditRecord>(&bytes)?);
            }
        }
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(records)
    }
}

fn io_err(path: &Path, source: io::Error) -> AuditError {
    AuditError::Io { path: path.to_path_buf(), source }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
