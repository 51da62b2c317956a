// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency graph command handlers

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use lk_core::{WorkUnit, WuId};
use lk_engine::{Bottleneck, DependencyGraph};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::app::App;
use crate::color;
use crate::exit_error::{ExitError, NEEDS_ATTENTION};

#[derive(Args)]
pub struct GraphArgs {
    /// JSON array of work units (`-` for stdin)
    #[arg(long, global = true, default_value = "-")]
    pub units: PathBuf,
    #[command(subcommand)]
    pub command: GraphCommand,
}

#[derive(Subcommand)]
pub enum GraphCommand {
    /// Fail if the blocking relationships contain a cycle
    Check,
    /// Print WUs with every blocker before the WUs it blocks
    Order,
    /// Print the longest chain of blocking WUs
    Critical,
    /// Print the WUs that block the most others
    Bottlenecks {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

pub fn handle(args: GraphArgs, app: &App) -> Result<()> {
    let units = read_units(&args.units)?;
    let graph = DependencyGraph::build(&units);
    match args.command {
        GraphCommand::Check => {
            let validation = graph.validate_graph();
            app.format.emit(&validation, |v| {
                if !v.has_cycle {
                    println!("{} work units, {}", graph.len(), color::good("no cycles"));
                }
            })?;
            if validation.has_cycle {
                let cycles: Vec<String> =
                    validation.cycles.iter().map(|c| render_cycle(c)).collect();
                let message = format!("dependency cycle: {}", cycles.join("; "));
                return Err(ExitError::new(NEEDS_ATTENTION, message).into());
            }
        }
        GraphCommand::Order => {
            let order = graph.topological_sort();
            app.format.emit(&order, |order| order.iter().for_each(|id| println!("{id}")))?;
        }
        GraphCommand::Critical => {
            let critical = graph.critical_path();
            app.format.emit(&critical, |c| {
                let path: Vec<&str> = c.path.iter().map(WuId::as_str).collect();
                println!("{} ({} WUs)", path.join(" -> "), c.length);
            })?;
        }
        GraphCommand::Bottlenecks { limit } => {
            let ranked = graph.bottlenecks(limit);
            app.format.emit(&ranked, |ranked: &Vec<Bottleneck>| {
                if ranked.is_empty() {
                    println!("no WU blocks another");
                }
                for b in ranked {
                    println!("{}  blocks {}", color::header(b.id.as_str()), b.score);
                }
            })?;
        }
    }
    Ok(())
}

fn render_cycle(cycle: &[WuId]) -> String {
    let mut ids: Vec<&str> = cycle.iter().map(WuId::as_str).collect();
    if let Some(first) = ids.first().copied() {
        ids.push(first);
    }
    ids.join(" -> ")
}

fn read_units(path: &Path) -> Result<Vec<WorkUnit>> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading work units from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&text)
        .with_context(|| format!("parsing work units from {}", path.display()))
}
