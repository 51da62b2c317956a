// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed JSON snapshots for resuming interrupted work.
//!
//! Writes go to a temp file that is fsynced and renamed into place, so a
//! reader sees either the previous snapshot or the new one. A snapshot that
//! fails to parse is moved aside to a rotated `.bak` and treated as absent.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Current snapshot envelope version
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const MAX_BAK_FILES: u32 = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid snapshot key `{0}`")]
    InvalidKey(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "v")]
    version: u32,
    saved_at: DateTime<Utc>,
    state: T,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, SnapshotError> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(SnapshotError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    pub fn save<T: Serialize>(&self, key: &str, state: &T) -> Result<(), SnapshotError> {
        let path = self.path_for(key)?;
        let envelope = Envelope { version: CURRENT_SNAPSHOT_VERSION, saved_at: Utc::now(), state };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
        file.write_all(&bytes).and_then(|()| file.sync_all()).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        debug!(key, path = %path.display(), "snapshot saved");
        Ok(())
    }

    /// Load a snapshot. Missing and unreadable snapshots are both `None`;
    /// unreadable ones are first moved to a `.bak` for inspection.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SnapshotError> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path, e)),
        };
        match serde_json::from_slice::<Envelope<T>>(&bytes) {
            Ok(envelope) => Ok(Some(envelope.state)),
            Err(e) => {
                let bak = rotate_bak_path(&path);
                warn!(key, error = %e, backup = %bak.display(), "corrupt snapshot moved aside");
                fs::rename(&path, &bak).map_err(|e| io_err(&path, e))?;
                Ok(None)
            }
        }
    }

    pub fn remove(&self, key: &str) -> Result<bool, SnapshotError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    /// Keys of all stored snapshots, sorted.
    pub fn keys(&self) -> Result<Vec<String>, SnapshotError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.dir, e)),
        };
        let mut keys: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn io_err(path: &Path, source: io::Error) -> SnapshotError {
    SnapshotError::Io { path: path.to_path_buf(), source }
}

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        if let Err(e) = fs::remove_file(&oldest) {
            warn!(path = %oldest.display(), error = %e, "failed to drop oldest snapshot backup");
        }
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            if let Err(e) = fs::rename(&src, bak(n + 1)) {
                warn!(path = %src.display(), error = %e, "failed to rotate snapshot backup");
            }
        }
    }
    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
