// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event log command handlers

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use lk_core::{format_rfc3339, WuEvent, WuId};
use lk_storage::WuEntry;
use std::io::Read;

use crate::app::App;
use crate::color;
use crate::exit_error::{ExitError, FAILED};
use crate::output::table;

#[derive(Args)]
pub struct EventsArgs {
    #[command(subcommand)]
    pub command: EventsCommand,
}

#[derive(Subcommand)]
pub enum EventsCommand {
    /// Validate and append one event (a JSON object, or `-` for stdin)
    Append { event: String },
    /// Replay the log and print the resulting WU states
    Replay {
        /// Show a single WU
        #[arg(long)]
        wu: Option<String>,
    },
}

pub fn handle(command: EventsCommand, app: &App) -> Result<()> {
    match command {
        EventsCommand::Append { event } => {
            let raw = if event == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).context("reading event from stdin")?;
                buf
            } else {
                event
            };
            let event: WuEvent = serde_json::from_str(raw.trim()).context("parsing event JSON")?;
            let store = app.events();
            store.append(&event)?;
            app.format.emit(&event, |e| {
                println!("appended {} for {}", e.name(), color::header(e.wu_id().as_str()))
            })?;
        }
        EventsCommand::Replay { wu } => {
            let mut store = app.events();
            store.load().map_err(|e| {
                let line = e.line();
                anyhow::Error::new(e).context(match line {
                    Some(line) => {
                        format!("{} is corrupt at line {line}", app.config.events_path().display())
                    }
                    None => format!("replaying {}", app.config.events_path().display()),
                })
            })?;
            let index = store.index();
            let entries: Vec<&WuEntry> = match &wu {
                Some(id) => {
                    let id = WuId::from(id.as_str());
                    let entry = index
                        .get(id.as_str())
                        .ok_or_else(|| ExitError::new(FAILED, format!("{id} has no events")))?;
                    vec![entry]
                }
                None => index.iter().collect(),
            };
            app.format.emit(&entries, |entries| print_entries(entries))?;
        }
    }
    Ok(())
}

fn print_entries(entries: &[&WuEntry]) {
    if entries.is_empty() {
        println!("no work units");
        return;
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                e.status.to_string(),
                if e.lane.is_empty() { "-".to_string() } else { e.lane.clone() },
                e.updated_at.map(format_rfc3339).unwrap_or_else(|| "-".to_string()),
                e.title.clone(),
            ]
        })
        .collect();
    println!("{}", table(&["ID", "STATUS", "LANE", "UPDATED", "TITLE"], &rows));
    for e in entries.iter().filter(|e| e.blocked_reason.is_some() || e.last_checkpoint.is_some()) {
        if let Some(reason) = &e.blocked_reason {
            println!("{} blocked: {reason}", e.id);
        }
        if let Some(cp) = &e.last_checkpoint {
            println!("{} checkpoint: {}", e.id, color::muted(&cp.note));
            if let Some(next) = &cp.next_steps {
                println!("  next: {next}");
            }
        }
    }
}
