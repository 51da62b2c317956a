// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn registry and monitor command handlers

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use lk_core::{format_rfc3339, Clock, SpawnId, SpawnRecord, SpawnStatus, SystemClock, WuId};
use lk_engine::{SpawnAction, SpawnRecovery};

use crate::app::App;
use crate::color;
use crate::exit_error::remediable;
use crate::output::table;

#[derive(Args)]
pub struct SpawnArgs {
    #[command(subcommand)]
    pub command: SpawnCommand,
}

#[derive(Subcommand)]
pub enum SpawnCommand {
    /// Record work delegated from one WU to a sub-agent
    Register {
        /// WU that delegated the work
        #[arg(long)]
        parent: String,
        /// WU the sub-agent works on
        #[arg(long)]
        target: String,
        /// Lane of the target WU
        #[arg(long)]
        lane: String,
    },
    /// List registered spawns
    List {
        /// Only spawns still pending
        #[arg(long)]
        pending: bool,
    },
    /// Move a pending spawn to a terminal status
    Finish {
        id: String,
        #[arg(long, value_enum, default_value_t = FinishStatus::Completed)]
        status: FinishStatus,
    },
    /// Check one spawn and recover it if its agent died or stalled
    Recover { id: String },
    /// Check every pending spawn
    Sweep,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum FinishStatus {
    Completed,
    Timeout,
    Crashed,
}

impl From<FinishStatus> for SpawnStatus {
    fn from(status: FinishStatus) -> Self {
        match status {
            FinishStatus::Completed => SpawnStatus::Completed,
            FinishStatus::Timeout => SpawnStatus::Timeout,
            FinishStatus::Crashed => SpawnStatus::Crashed,
        }
    }
}

pub fn handle(command: SpawnCommand, app: &App) -> Result<()> {
    match command {
        SpawnCommand::Register { parent, target, lane } => {
            let record = SpawnRecord::new(
                WuId::from(parent.as_str()),
                WuId::from(target.as_str()),
                lane,
                SystemClock.utc(),
            );
            app.registry().register(&record).map_err(remediable)?;
            app.format.emit(&record, |r| {
                let id = color::header(r.id.as_str());
                println!("registered {id} ({} -> {})", r.parent_wu_id, r.target_wu_id);
            })?;
        }
        SpawnCommand::List { pending } => {
            let registry = app.registry();
            let spawns =
                if pending { registry.pending() } else { registry.all() }.map_err(remediable)?;
            app.format.emit(&spawns, |spawns| print_spawns(spawns))?;
        }
        SpawnCommand::Finish { id, status } => {
            let record = app
                .registry()
                .finish(&SpawnId::from(id.as_str()), status.into(), SystemClock.utc())
                .map_err(remediable)?;
            app.format.emit(&record, |r| {
                println!("{} is {}", color::header(r.id.as_str()), r.status)
            })?;
        }
        SpawnCommand::Recover { id } => {
            let recovery = app
                .monitor()
                .recover_stuck_spawn(&SpawnId::from(id.as_str()))
                .map_err(remediable)?;
            app.format.emit(&recovery, print_recovery)?;
        }
        SpawnCommand::Sweep => {
            let recoveries = app.monitor().sweep().map_err(remediable)?;
            app.format.emit(&recoveries, |all| {
                if all.is_empty() {
                    println!("no pending spawns");
                }
                all.iter().for_each(print_recovery);
            })?;
        }
    }
    Ok(())
}

fn print_spawns(spawns: &[SpawnRecord]) {
    if spawns.is_empty() {
        println!("no spawns");
        return;
    }
    let rows: Vec<Vec<String>> = spawns
        .iter()
        .map(|s| {
            vec![
                s.id.to_string(),
                s.status.to_string(),
                s.parent_wu_id.to_string(),
                s.target_wu_id.to_string(),
                s.lane.clone(),
                format_rfc3339(s.spawned_at),
            ]
        })
        .collect();
    println!("{}", table(&["ID", "STATUS", "PARENT", "TARGET", "LANE", "SPAWNED"], &rows));
}

fn print_recovery(recovery: &SpawnRecovery) {
    let action = match recovery.action {
        SpawnAction::None => color::good(&recovery.action.to_string()),
        _ => color::bad(&recovery.action.to_string()),
    };
    println!("{} {action}: {}", color::header(recovery.spawn_id.as_str()), recovery.reason);
    if let Some(path) = &recovery.audit_path {
        println!("  audit: {}", path.display());
    }
}
