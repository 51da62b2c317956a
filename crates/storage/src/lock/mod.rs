// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-based advisory mutual exclusion across agent processes.
//!
//! One JSON file per resource under the lock directory. A lock is created by
//! writing the full record to a private temp file and hard-linking it into
//! place: `link(2)` fails with `EEXIST` when the path is taken, so creation
//! is atomic and exclusive and no reader ever sees a half-written record.
//!
//! A held record is reclaimable by anyone once it is a zombie (its pid is
//! gone, checked first and regardless of age) or stale (older than the
//! kind's threshold in [`LockPolicy`]). Corrupt records are treated as
//! absent. Removal re-reads the record under an exclusive `fs2` lock on a
//! per-resource `.guard` sidecar, so only the record that was judged
//! reclaimable is ever deleted. Every wait is bounded by
//! [`AcquireOptions::wait`].

mod probe;
mod record;

pub use probe::{Liveness, ProcessProbe, SignalProbe};
#[cfg(any(test, feature = "test-support"))]
pub use probe::FakeProbe;
pub use record::{LockKind, LockPolicy, LockRecord, Resource, ResourceParseError};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use lk_core::{format_elapsed, Clock, SystemClock};
use std::fs::OpenOptions;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reclaim attempts per `acquire` before giving up; bounds the loop when
/// several processes keep reclaiming the same dead lock.
const MAX_RECLAIMS: u32 = 16;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode lock record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(
        "{resource} is held by {held_by} since {held_since} (waited {}); \
         wait and retry, or run `lk lock unlock {resource}` if the holder is gone",
        format_elapsed(.waited.as_secs())
    )]
    Contention {
        resource: Resource,
        held_by: String,
        held_since: DateTime<Utc>,
        waited: Duration,
    },
    #[error(
        "gave up on {resource} after {} reclaim attempts; another process keeps replacing it",
        MAX_RECLAIMS
    )]
    ReclaimLoop { resource: Resource },
}

impl lk_core::Remediation for LockError {
    fn next_step(&self) -> Option<String> {
        match self {
            LockError::Contention { resource, .. } | LockError::ReclaimLoop { resource } => {
                Some(format!("lk lock unlock {resource}"))
            }
            LockError::Io { .. } | LockError::Encode(_) => None,
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> LockError + '_ {
    move |source| LockError::Io { path: path.to_path_buf(), source }
}

/// Options for a single acquisition.
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    /// How long to poll for a held lock. `None` uses the policy default.
    pub wait: Option<Duration>,
    pub metadata: Option<serde_json::Value>,
}

impl AcquireOptions {
    pub fn wait(wait: Duration) -> Self {
        Self { wait: Some(wait), metadata: None }
    }

    /// Fail immediately if held.
    pub fn no_wait() -> Self {
        Self::wait(Duration::ZERO)
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Outcome of [`LockManager::acquire`].
#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
    pub acquired: bool,
    pub lock_id: Option<String>,
    /// Current holder when not acquired.
    pub held_by: Option<String>,
    pub held_since: Option<DateTime<Utc>>,
    /// The owner already held this lock; the existing lock id is returned.
    pub reentrant: bool,
}

impl Acquisition {
    fn granted(record: &LockRecord, reentrant: bool) -> Self {
        Self {
            acquired: true,
            lock_id: Some(record.lock_id.clone()),
            held_by: None,
            held_since: None,
            reentrant,
        }
    }

    fn denied(record: &LockRecord) -> Self {
        Self {
            acquired: false,
            lock_id: None,
            held_by: Some(record.owner_id.clone()),
            held_since: Some(record.created_at),
            reentrant: false,
        }
    }
}

/// Validity of an existing lock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Stale { age: Duration },
    Zombie,
}

/// What is on disk for a resource right now.
#[derive(Debug, Clone, PartialEq)]
pub enum LockStatus {
    Free,
    Held(LockRecord),
    Stale { record: LockRecord, age: Duration },
    Zombie(LockRecord),
    Corrupt,
}

impl LockStatus {
    pub fn record(&self) -> Option<&LockRecord> {
        match self {
            LockStatus::Held(r) | LockStatus::Zombie(r) | LockStatus::Stale { record: r, .. } => {
                Some(r)
            }
            LockStatus::Free | LockStatus::Corrupt => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LockStatus::Free => "free",
            LockStatus::Held(_) => "held",
            LockStatus::Stale { .. } => "stale",
            LockStatus::Zombie(_) => "zombie",
            LockStatus::Corrupt => "corrupt",
        }
    }
}

enum Existing {
    Missing,
    Corrupt(Vec<u8>),
    Record(LockRecord),
}

/// Cross-process lock manager rooted at one lock directory.
#[derive(Clone)]
pub struct LockManager<C: Clock = SystemClock> {
    dir: PathBuf,
    policy: LockPolicy,
    clock: C,
    probe: Arc<dyn ProcessProbe>,
    pid: u32,
    hostname: String,
}

impl LockManager<SystemClock> {
    pub fn new(dir: impl Into<PathBuf>, policy: LockPolicy) -> Self {
        Self::with_parts(dir, policy, SystemClock, Arc::new(SignalProbe))
    }
}

impl<C: Clock> LockManager<C> {
    pub fn with_parts(
        dir: impl Into<PathBuf>,
        policy: LockPolicy,
        clock: C,
        probe: Arc<dyn ProcessProbe>,
    ) -> Self {
        Self {
            dir: dir.into(),
            policy,
            clock,
            probe,
            pid: std::process::id(),
            hostname: local_hostname(),
        }
    }

    /// Override the pid written into new records (tests simulate other processes).
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> &LockPolicy {
        &self.policy
    }

    pub fn path_for(&self, resource: &Resource) -> PathBuf {
        self.dir.join(resource.file_name())
    }

    /// Try to take `resource` for `owner_id`, polling up to the wait budget.
    ///
    /// Returns `acquired: false` with the holder's identity when the budget
    /// runs out; I/O failures are errors.
    pub async fn acquire(
        &self,
        resource: &Resource,
        owner_id: &str,
        opts: AcquireOptions,
    ) -> Result<Acquisition, LockError> {
        std::fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;
        let path = self.path_for(resource);
        let wait = opts.wait.unwrap_or(self.policy.default_wait);
        let started = tokio::time::Instant::now();
        let deadline = started + wait;
        let mut reclaims = 0;

        loop {
            let record = self.new_record(owner_id, opts.metadata.clone());
            if create_exclusive(&path, &record)? {
                info!(%resource, owner = owner_id, lock_id = %record.lock_id, "lock acquired");
                return Ok(Acquisition::granted(&record, false));
            }

            match read_existing(&path)? {
                Existing::Missing => continue,
                Existing::Corrupt(bytes) => {
                    warn!(%resource, path = %path.display(), "corrupt lock file treated as free");
                    remove_if_unchanged(&path, &bytes)?;
                }
                Existing::Record(existing) => match self.validity(resource.kind(), &existing) {
                    Validity::Valid if existing.owner_id == owner_id => {
                        debug!(%resource, owner = owner_id, "lock already held by owner");
                        return Ok(Acquisition::granted(&existing, true));
                    }
                    Validity::Valid => {
                        let now = tokio::time::Instant::now();
                        if now >= deadline {
                            debug!(
                                %resource,
                                held_by = %existing.owner_id,
                                "lock wait budget exhausted"
                            );
                            return Ok(Acquisition::denied(&existing));
                        }
                        let pause = self.policy.poll_interval.min(deadline - now);
                        tokio::time::sleep(pause).await;
                        continue;
                    }
                    validity => {
                        warn!(
                            %resource,
                            held_by = %existing.owner_id,
                            pid = existing.pid,
                            ?validity,
                            "reclaiming invalid lock"
                        );
                        remove_if_lock_id(&path, &existing.lock_id)?;
                    }
                },
            }

            reclaims += 1;
            if reclaims >= MAX_RECLAIMS {
                return Err(LockError::ReclaimLoop { resource: resource.clone() });
            }
        }
    }

    /// Acquire and wrap in a guard that releases on drop.
    pub async fn lock(
        &self,
        resource: &Resource,
        owner_id: &str,
        opts: AcquireOptions,
    ) -> Result<LockGuard, LockError> {
        let started = tokio::time::Instant::now();
        let acquisition = self.acquire(resource, owner_id, opts).await?;
        match (acquisition.acquired, acquisition.lock_id) {
            (true, Some(lock_id)) => Ok(LockGuard {
                path: self.path_for(resource),
                resource: resource.clone(),
                lock_id,
                owned: !acquisition.reentrant,
                released: false,
            }),
            _ => Err(LockError::Contention {
                resource: resource.clone(),
                held_by: acquisition.held_by.unwrap_or_default(),
                held_since: acquisition.held_since.unwrap_or_default(),
                waited: started.elapsed(),
            }),
        }
    }

    /// Run `f` while holding `resource`; the lock is released on every exit
    /// path, including errors and panics (through the guard's `Drop`).
    pub async fn with_lock<T, E, F, Fut>(
        &self,
        resource: &Resource,
        owner_id: &str,
        opts: AcquireOptions,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let guard = self.lock(resource, owner_id, opts).await?;
        let result = f().await;
        let released = guard.release();
        let value = result?;
        released?;
        Ok(value)
    }

    /// Acquire several resources in global lock order.
    ///
    /// On failure every lock taken so far is released before returning.
    pub async fn lock_ordered(
        &self,
        resources: &[Resource],
        owner_id: &str,
        opts: AcquireOptions,
    ) -> Result<LockSet, LockError> {
        let mut ordered = resources.to_vec();
        ordered.sort_by(|a, b| {
            a.kind().rank().cmp(&b.kind().rank()).then_with(|| a.key().cmp(b.key()))
        });
        ordered.dedup();

        let mut set = LockSet::default();
        for resource in &ordered {
            let guard = self.lock(resource, owner_id, opts.clone()).await?;
            set.push(guard);
        }
        Ok(set)
    }

    /// Release only if `lock_id` matches the record on disk.
    pub fn release(&self, resource: &Resource, lock_id: &str) -> Result<bool, LockError> {
        let released = remove_if_lock_id(&self.path_for(resource), lock_id)?;
        if released {
            info!(%resource, lock_id, "lock released");
        } else {
            debug!(%resource, lock_id, "release skipped: lock not held with this id");
        }
        Ok(released)
    }

    /// Remove the lock regardless of owner. Returns the removed record if it
    /// was readable.
    pub fn force_release(&self, resource: &Resource) -> Result<Option<LockRecord>, LockError> {
        let path = self.path_for(resource);
        let previous = with_guard(&path, || {
            let previous = match read_existing(&path)? {
                Existing::Record(r) => Some(r),
                Existing::Missing => return Ok(None),
                Existing::Corrupt(_) => None,
            };
            remove_lock_file(&path)?;
            Ok(Some(previous))
        })?;
        let Some(previous) = previous else {
            return Ok(None);
        };
        warn!(%resource, held_by = ?previous.as_ref().map(|r| &r.owner_id), "lock force-released");
        Ok(previous)
    }

    /// Read and classify the lock for `resource` without changing anything.
    pub fn inspect(&self, resource: &Resource) -> Result<LockStatus, LockError> {
        Ok(match read_existing(&self.path_for(resource))? {
            Existing::Missing => LockStatus::Free,
            Existing::Corrupt(_) => LockStatus::Corrupt,
            Existing::Record(record) => match self.validity(resource.kind(), &record) {
                Validity::Valid => LockStatus::Held(record),
                Validity::Stale { age } => LockStatus::Stale { record, age },
                Validity::Zombie => LockStatus::Zombie(record),
            },
        })
    }

    /// All lock files in the directory with their current status.
    pub fn list(&self) -> Result<Vec<(Resource, LockStatus)>, LockError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.dir)(e)),
        };
        let mut locks = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(resource) = name.to_str().and_then(Resource::from_file_name) else {
                continue;
            };
            let status = self.inspect(&resource)?;
            locks.push((resource, status));
        }
        locks.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(locks)
    }

    /// Zombie takes precedence over age.
    pub fn validity(&self, kind: LockKind, record: &LockRecord) -> Validity {
        if record.hostname == self.hostname && self.probe.liveness(record.pid) == Liveness::Dead {
            return Validity::Zombie;
        }
        let age = self.age(record);
        if age > self.policy.stale_after(kind) {
            Validity::Stale { age }
        } else {
            Validity::Valid
        }
    }

    /// Age of a record by this manager's clock (zero for future timestamps).
    pub fn age(&self, record: &LockRecord) -> Duration {
        self.clock.since(record.created_at)
    }

    fn new_record(&self, owner_id: &str, metadata: Option<serde_json::Value>) -> LockRecord {
        LockRecord {
            owner_id: owner_id.to_string(),
            lock_id: uuid::Uuid::new_v4().to_string(),
            created_at: self.clock.utc(),
            pid: self.pid,
            hostname: self.hostname.clone(),
            metadata,
        }
    }
}

/// RAII lock handle. Dropping it releases the lock (best effort).
///
/// Guards for re-entrant acquisitions do not release: the outer holder
/// still owns the lock.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    resource: Resource,
    lock_id: String,
    owned: bool,
    released: bool,
}

impl LockGuard {
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }

    /// Release now, surfacing I/O errors that `Drop` would swallow.
    pub fn release(mut self) -> Result<bool, LockError> {
        self.released = true;
        if !self.owned {
            return Ok(false);
        }
        let released = remove_if_lock_id(&self.path, &self.lock_id)?;
        if released {
            info!(resource = %self.resource, lock_id = %self.lock_id, "lock released");
        }
        Ok(released)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released || !self.owned {
            return;
        }
        if let Err(e) = remove_if_lock_id(&self.path, &self.lock_id) {
            warn!(resource = %self.resource, error = %e, "failed to release lock on drop");
        }
    }
}

/// Locks held together, acquired in global order and released in reverse.
#[derive(Debug, Default)]
pub struct LockSet {
    guards: Vec<LockGuard>,
}

impl LockSet {
    fn push(&mut self, guard: LockGuard) {
        debug_assert!(
            self.guards
                .last()
                .is_none_or(|g| g.resource.kind().rank() <= guard.resource.kind().rank()),
            "lock order violation: {} after {:?}",
            guard.resource,
            self.guards.last().map(|g| g.resource.to_string()),
        );
        self.guards.push(guard);
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.guards.iter().map(|g| &g.resource)
    }

    pub fn release(mut self) -> Result<(), LockError> {
        while let Some(guard) = self.guards.pop() {
            guard.release()?;
        }
        Ok(())
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

fn local_hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Write the record to a private temp file and hard-link it into place.
/// Returns `false` when the lock path already exists.
fn create_exclusive(path: &Path, record: &LockRecord) -> Result<bool, LockError> {
    let tmp = path.with_extension(format!("{}.tmp", record.lock_id));
    let bytes = serde_json::to_vec_pretty(record)?;
    std::fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
    let linked = std::fs::hard_link(&tmp, path);
    if let Err(e) = std::fs::remove_file(&tmp) {
        warn!(path = %tmp.display(), error = %e, "failed to remove lock temp file");
    }
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(io_err(path)(e)),
    }
}

fn read_existing(path: &Path) -> Result<Existing, LockError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Existing::Missing),
        Err(e) => return Err(io_err(path)(e)),
    };
    Ok(match serde_json::from_slice::<LockRecord>(&bytes) {
        Ok(record) => Existing::Record(record),
        Err(_) => Existing::Corrupt(bytes),
    })
}

/// Run `f` while holding an exclusive `fs2` lock on the resource's sidecar
/// `.guard` file.
///
/// Every read-then-remove of a lock file goes through here, so a reclaimer
/// can never delete a record that another reclaimer linked in after the
/// first read. Creation needs no guard: `hard_link` only succeeds on a
/// missing path.
fn with_guard<T>(path: &Path, f: impl FnOnce() -> Result<T, LockError>) -> Result<T, LockError> {
    let guard_path = path.with_extension("guard");
    if let Some(dir) = guard_path.parent() {
        std::fs::create_dir_all(dir).map_err(io_err(dir))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&guard_path)
        .map_err(io_err(&guard_path))?;
    file.lock_exclusive().map_err(io_err(&guard_path))?;
    let result = f();
    if let Err(e) = FileExt::unlock(&file) {
        warn!(path = %guard_path.display(), error = %e, "failed to unlock lock guard");
    }
    result
}

fn remove_lock_file(path: &Path) -> Result<bool, LockError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(path)(e)),
    }
}

/// Remove the lock file only if it still carries `lock_id`.
fn remove_if_lock_id(path: &Path, lock_id: &str) -> Result<bool, LockError> {
    with_guard(path, || match read_existing(path)? {
        Existing::Record(record) if record.lock_id == lock_id => remove_lock_file(path),
        _ => Ok(false),
    })
}

/// Remove a corrupt lock file only if its bytes are still `expected`.
fn remove_if_unchanged(path: &Path, expected: &[u8]) -> Result<(), LockError> {
    with_guard(path, || match read_existing(path)? {
        Existing::Corrupt(bytes) if bytes == expected => remove_lock_file(path).map(|_| ()),
        _ => Ok(()),
    })
}

#[cfg(test)]
#[path = "../lock_tests.rs"]
mod tests;
