// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process liveness probing for zombie-lock detection.

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Result of probing a recorded pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    /// The kernel reported no such process.
    Dead,
    /// The probe could not decide (foreign host, invalid pid, unexpected errno).
    Unknown,
}

/// Answers whether a pid on this host is still running.
pub trait ProcessProbe: Send + Sync {
    fn liveness(&self, pid: u32) -> Liveness;
}

/// Signal-0 probe via `kill(2)`.
///
/// `EPERM` means the process exists but belongs to another user, so it is
/// reported as alive: permission denied is not evidence of death.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

impl ProcessProbe for SignalProbe {
    fn liveness(&self, pid: u32) -> Liveness {
        let Ok(raw) = i32::try_from(pid) else {
            return Liveness::Unknown;
        };
        // pid 0 and negatives address process groups, not a single process
        if raw <= 0 {
            return Liveness::Unknown;
        }
        match kill(Pid::from_raw(raw), None) {
            Ok(()) => Liveness::Alive,
            Err(Errno::ESRCH) => Liveness::Dead,
            Err(Errno::EPERM) => Liveness::Alive,
            Err(e) => {
                tracing::debug!(pid, error = %e, "unexpected errno from liveness probe");
                Liveness::Unknown
            }
        }
    }
}

/// Scriptable probe for tests: every pid is alive unless marked dead.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    dead: std::sync::Arc<parking_lot::Mutex<std::collections::HashSet<u32>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kill(&self, pid: u32) {
        self.dead.lock().insert(pid);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ProcessProbe for FakeProbe {
    fn liveness(&self, pid: u32) -> Liveness {
        if self.dead.lock().contains(&pid) {
            Liveness::Dead
        } else {
            Liveness::Alive
        }
    }
}
