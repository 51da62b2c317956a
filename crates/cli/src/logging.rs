// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostics for the `lk` binary.
//!
//! `LK_LOG` sets the filter (default `warn`) for compact stderr output.
//! Setting `LK_LOG_FILE=1` also writes a daily rolling file under the
//! state directory's `logs/`, filtered at `info` unless `LK_LOG` says
//! otherwise.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_ENV: &str = "LK_LOG";
pub const LOG_FILE_ENV: &str = "LK_LOG_FILE";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

fn file_logging_enabled() -> bool {
    std::env::var(LOG_FILE_ENV).is_ok_and(|v| !v.is_empty() && v != "0")
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init(logs_dir: &Path) -> Option<WorkerGuard> {
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false)
        .with_filter(filter("warn"));

    let mut guard = None;
    let file = if file_logging_enabled() && std::fs::create_dir_all(logs_dir).is_ok() {
        let appender = tracing_appender::rolling::daily(logs_dir, "lk.log");
        let (writer, g) = tracing_appender::non_blocking(appender);
        guard = Some(g);
        Some(fmt::layer().with_writer(writer).with_ansi(false).with_filter(filter("info")))
    } else {
        None
    };

    // A second init (tests embedding the CLI) keeps the first subscriber
    let _ = tracing_subscriber::registry().with(stderr).with(file).try_init();
    guard
}
