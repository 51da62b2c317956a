//! Behavioral specs for the `lk` binary.
//!
//! Each spec drives the built CLI against a scratch repository and state
//! directory, so nothing here depends on the host's git config or state.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/cli/mod.rs"]
mod cli;
