// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock command handlers

use anyhow::Result;
use clap::{Args, Subcommand};
use lk_core::{format_rfc3339, Clock, SystemClock};
use lk_storage::{AcquireOptions, LockRecord, LockStatus, Resource};
use serde::Serialize;
use std::time::Duration;

use crate::app::App;
use crate::color;
use crate::exit_error::{remediable, ExitError, CONTENDED};
use crate::output::{format_age, table};

#[derive(Args)]
pub struct LockArgs {
    #[command(subcommand)]
    pub command: LockCommand,
}

#[derive(Subcommand)]
pub enum LockCommand {
    /// Acquire a lock (lane:<name>, merge, cleanup, or state:<key>)
    Acquire {
        resource: Resource,
        /// Owner recorded in the lock, usually a WU id
        #[arg(long)]
        owner: String,
        /// How long to wait for a held lock, in milliseconds
        #[arg(long)]
        wait_ms: Option<u64>,
        /// Process whose liveness keeps the lock valid (default: the caller)
        #[arg(long)]
        pid: Option<u32>,
    },
    /// Release a lock by the id returned from `acquire`
    Release {
        resource: Resource,
        #[arg(long)]
        lock_id: String,
    },
    /// List every lock file and its state
    List,
    /// Remove a lock regardless of owner
    Unlock {
        resource: Resource,
        /// Also remove a lock whose holder is still alive
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Acquired {
    resource: String,
    owner_id: String,
    lock_id: Option<String>,
    reentrant: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LockRow {
    resource: String,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lock_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_secs: Option<u64>,
}

impl LockRow {
    fn new(resource: &Resource, status: &LockStatus) -> Self {
        let state = match status {
            LockStatus::Free => "free",
            LockStatus::Held(_) => "held",
            LockStatus::Stale { .. } => "stale",
            LockStatus::Zombie(_) => "zombie",
            LockStatus::Corrupt => "corrupt",
        };
        let record = status.record();
        Self {
            resource: resource.to_string(),
            state,
            owner_id: record.map(|r| r.owner_id.clone()),
            lock_id: record.map(|r| r.lock_id.clone()),
            pid: record.map(|r| r.pid),
            created_at: record.map(|r| format_rfc3339(r.created_at)),
            age_secs: record.map(|r| age(r).as_secs()),
        }
    }
}

fn age(record: &LockRecord) -> Duration {
    SystemClock.since(record.created_at)
}

pub async fn handle(command: LockCommand, app: &App) -> Result<()> {
    let locks = app.locks();
    match command {
        LockCommand::Acquire { resource, owner, wait_ms, pid } => {
            let pid = pid.unwrap_or_else(std::os::unix::process::parent_id);
            let opts = AcquireOptions { wait: wait_ms.map(Duration::from_millis), metadata: None };
            let acquisition =
                locks.with_pid(pid).acquire(&resource, &owner, opts).await.map_err(remediable)?;
            if !acquisition.acquired {
                let holder = acquisition.held_by.unwrap_or_else(|| "an unknown owner".to_string());
                let since = acquisition
                    .held_since
                    .map(format_rfc3339)
                    .unwrap_or_else(|| "an unknown time".to_string());
                let message = format!("{resource} is held by {holder} since {since}");
                return Err(ExitError::new(CONTENDED, message)
                    .with_next(Some("lk lock list".to_string()))
                    .into());
            }
            let acquired = Acquired {
                resource: resource.to_string(),
                owner_id: owner,
                lock_id: acquisition.lock_id,
                reentrant: acquisition.reentrant,
            };
            app.format.emit(&acquired, |a| {
                let verb = if a.reentrant { "already held" } else { "acquired" };
                let lock_id = a.lock_id.as_deref().unwrap_or("-");
                println!("{} {verb}: {lock_id}", color::header(&a.resource));
            })?;
        }
        LockCommand::Release { resource, lock_id } => {
            let released = locks.release(&resource, &lock_id).map_err(remediable)?;
            let report =
                serde_json::json!({ "resource": resource.to_string(), "released": released });
            app.format.emit(&report, |_| {
                if released {
                    println!("released {resource}");
                } else {
                    println!("{resource} is not held under {lock_id}; nothing released");
                }
            })?;
        }
        LockCommand::List => {
            let rows: Vec<LockRow> = locks
                .list()
                .map_err(remediable)?
                .iter()
                .map(|(resource, status)| LockRow::new(resource, status))
                .collect();
            app.format.emit(&rows, |rows| {
                if rows.is_empty() {
                    println!("no locks");
                    return;
                }
                let cells: Vec<Vec<String>> = rows
                    .iter()
                    .map(|r| {
                        vec![
                            r.resource.clone(),
                            r.state.to_string(),
                            r.owner_id.clone().unwrap_or_else(|| "-".to_string()),
                            r.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                            r.age_secs
                                .map(|s| format_age(Duration::from_secs(s)))
                                .unwrap_or_else(|| "-".to_string()),
                        ]
                    })
                    .collect();
                println!("{}", table(&["RESOURCE", "STATE", "OWNER", "PID", "AGE"], &cells));
            })?;
        }
        LockCommand::Unlock { resource, force } => {
            let status = locks.inspect(&resource).map_err(remediable)?;
            if let LockStatus::Held(record) = &status {
                if !force {
                    let message = format!(
                        "{resource} is held by live owner {} (pid {})",
                        record.owner_id, record.pid
                    );
                    return Err(ExitError::new(CONTENDED, message)
                        .with_next(Some(format!("lk lock unlock {resource} --force")))
                        .into());
                }
            }
            let previous = locks.force_release(&resource).map_err(remediable)?;
            let owner = previous.map(|r| r.owner_id);
            let report =
                serde_json::json!({ "resource": resource.to_string(), "previousOwner": owner });
            app.format.emit(&report, |_| match &owner {
                Some(owner) => println!("unlocked {resource} (was held by {owner})"),
                None => println!("{resource} was not locked"),
            })?;
        }
    }
    Ok(())
}
