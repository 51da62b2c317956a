// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only WU event log (JSONL) and its replayed index.
//!
//! Each line is one [`WuEvent`]. Appends validate first and take an
//! exclusive `flock` on the file so concurrent agents never interleave
//! partial lines. Loading is fail-loud: a malformed line stops the load with
//! its 1-based line number. Blank lines are skipped.

use crate::index::WuIndex;
use fs2::FileExt;
use lk_core::{EventValidationError, WuEvent};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("event log I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rejected {event} event: {source}")]
    Validation {
        event: &'static str,
        #[source]
        source: EventValidationError,
    },
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{}:{line}: not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("{}:{line}: invalid event: {reason}", .path.display())]
    Invalid { path: PathBuf, line: usize, reason: String },
}

impl EventStoreError {
    /// 1-based line number for load failures.
    pub fn line(&self) -> Option<usize> {
        match self {
            EventStoreError::Parse { line, .. } | EventStoreError::Invalid { line, .. } => {
                Some(*line)
            }
            _ => None,
        }
    }
}

/// Event log file plus the in-memory index replayed from it.
#[derive(Debug)]
pub struct EventStore {
    path: PathBuf,
    index: WuIndex,
}

impl EventStore {
    /// Store over `path` with an empty index. Call [`EventStore::load`] to replay.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), index: WuIndex::new() }
    }

    /// Create the store and replay the log.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, EventStoreError> {
        let mut store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &WuIndex {
        &self.index
    }

    /// Validate and append one event as a JSON line.
    pub fn append(&self, event: &WuEvent) -> Result<(), EventStoreError> {
        event
            .validate()
            .map_err(|source| EventStoreError::Validation { event: event.name(), source })?;
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io(e))?;
        file.lock_exclusive().map_err(|e| self.io(e))?;
        let written = file.write_all(line.as_bytes()).and_then(|()| file.sync_data());
        if let Err(e) = FileExt::unlock(&file) {
            warn!(path = %self.path.display(), error = %e, "failed to unlock");
        }
        written.map_err(|e| self.io(e))?;

        debug!(wu_id = %event.wu_id(), event = event.name(), "event appended");
        Ok(())
    }

    /// Append, then apply to the in-memory index.
    pub fn append_and_apply(&mut self, event: WuEvent) -> Result<(), EventStoreError> {
        self.append(&event)?;
        self.index.apply_event(&event);
        Ok(())
    }

    /// Clear the index and rebuild it from the log.
    ///
    /// The whole file is parsed before anything is applied, so a failed load
    /// leaves the index empty rather than partially replayed.
    pub fn load(&mut self) -> Result<(), EventStoreError> {
        self.index.clear();
        let events = self.read_events()?;
        for event in &events {
            self.index.apply_event(event);
        }
        info!(
            path = %self.path.display(),
            events = events.len(),
            wus = self.index.len(),
            "event log replayed"
        );
        Ok(())
    }

    /// Parse every event in file order. A missing file is an empty log.
    pub fn read_events(&self) -> Result<Vec<WuEvent>, EventStoreError> {
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

        let mut events = Vec::new();
        for (idx, raw) in contents.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            events.push(self.parse_line(idx + 1, raw)?);
        }
        Ok(events)
    }

    fn parse_line(&self, line: usize, raw: &str) -> Result<WuEvent, EventStoreError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|source| EventStoreError::Parse { path: self.path.clone(), line, source })?;
        let invalid =
            |reason: String| EventStoreError::Invalid { path: self.path.clone(), line, reason };
        let event: WuEvent = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
        event.validate().map_err(|e| invalid(e.to_string()))?;
        Ok(event)
    }

    fn io(&self, source: io::Error) -> EventStoreError {
        EventStoreError::Io { path: self.path.clone(), source }
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
