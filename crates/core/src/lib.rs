// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lk-core: shared data model for Lanekeeper work-unit coordination

pub mod macros;

pub mod clock;
pub mod event;
pub mod id;
pub mod remedy;
pub mod spawn;
pub mod time_fmt;
pub mod wu;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{EventValidationError, WuEvent};
pub use id::short;
pub use remedy::Remediation;
pub use spawn::{SpawnId, SpawnRecord, SpawnStatus, SpawnTransitionError};
pub use time_fmt::{format_elapsed, format_rfc3339, parse_rfc3339};
#[cfg(any(test, feature = "test-support"))]
pub use wu::WorkUnitBuilder;
pub use wu::{WorkUnit, WuId, WuStatus};
