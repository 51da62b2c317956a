// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! lk: coordinate work-unit completion across agents sharing one repository

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod app;
mod color;
mod commands;
mod exit_error;
mod logging;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lk_engine::Config;
use std::path::PathBuf;

use crate::app::App;
use crate::commands::{complete, events, graph, lock, merge, recover, spawn};
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "lk",
    version,
    about = "Lanekeeper: locks, atomic merges, and recovery for lane-based agents"
)]
#[command(styles = color::styles())]
struct Cli {
    /// Repository root (default: current directory)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect, take, and release coordination locks
    Lock(lock::LockArgs),
    /// Append to and replay the WU event log
    Events(events::EventsArgs),
    /// Validate, gate, merge, push, and clean up a WU
    Complete(complete::CompleteArgs),
    /// Merge a lane branch into the trunk without the rest of completion
    Merge(merge::MergeArgs),
    /// Diagnose and repair what interrupted runs left behind
    Recover(recover::RecoverArgs),
    /// Track delegated sub-agents and recover stuck ones
    Spawn(spawn::SpawnArgs),
    /// Analyze WU blocking relationships
    Graph(graph::GraphArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        let (text, code) = exit_error::render(&err);
        eprintln!("{text}");
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let repo = match cli.repo {
        Some(repo) => repo,
        None => std::env::current_dir().context("resolving the current directory")?,
    };
    let config = Config::load(repo)?;
    let _log_guard = logging::init(&config.logs_dir());
    tracing::debug!(
        repo = %config.repo_root().display(),
        state_dir = %config.state_dir.display(),
        "starting"
    );

    let app = App::new(config, cli.format);
    match cli.command {
        Command::Lock(args) => lock::handle(args.command, &app).await,
        Command::Events(args) => events::handle(args.command, &app),
        Command::Complete(args) => complete::handle(args, &app).await,
        Command::Merge(args) => merge::handle(args, &app).await,
        Command::Recover(args) => recover::handle(args.command, &app).await,
        Command::Spawn(args) => spawn::handle(args.command, &app),
        Command::Graph(args) => graph::handle(args, &app),
    }
}
