// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery command handlers

use anyhow::Result;
use clap::{Args, Subcommand};
use lk_core::WuId;
use lk_engine::{ActionKind, RecoveryAnalysis, RecoveryOutcome};

use crate::app::App;
use crate::color;
use crate::exit_error::remediable;

#[derive(Args)]
pub struct RecoverArgs {
    #[command(subcommand)]
    pub command: RecoverCommand,
}

#[derive(Subcommand)]
pub enum RecoverCommand {
    /// Report what a crashed run left behind and how to fix it
    Analyze {
        #[arg(long)]
        wu: String,
    },
    /// Apply one proposed recovery action
    Run {
        #[arg(long)]
        wu: String,
        /// resume, reset, complete, cleanup, or release-lock
        #[arg(long)]
        action: ActionKind,
        /// Allow actions that discard work
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle(command: RecoverCommand, app: &App) -> Result<()> {
    let executor = app.recovery();
    match command {
        RecoverCommand::Analyze { wu } => {
            let analysis = executor.analyze(&WuId::from(wu.as_str())).await.map_err(remediable)?;
            app.format.emit(&analysis, print_analysis)?;
        }
        RecoverCommand::Run { wu, action, force } => {
            let outcome = executor
                .execute(&WuId::from(wu.as_str()), action, force)
                .await
                .map_err(remediable)?;
            app.format.emit(&outcome, print_outcome)?;
        }
    }
    Ok(())
}

fn print_analysis(analysis: &RecoveryAnalysis) {
    let id = color::header(analysis.wu_id.as_str());
    if !analysis.has_issues {
        println!("{id}: {}", color::good("no issues"));
        return;
    }
    println!("{id}: {} issue(s)", analysis.issues.len());
    for issue in &analysis.issues {
        println!("  {} {}", color::bad(&issue.code.to_string()), issue.description);
    }
    println!("actions:");
    for action in &analysis.actions {
        println!("  {}  {}", action.command, color::muted(&action.description));
        if let Some(warning) = &action.warning {
            println!("    warning: {warning}");
        }
    }
}

fn print_outcome(outcome: &RecoveryOutcome) {
    println!("{} {} applied", color::header(outcome.wu_id.as_str()), outcome.action);
    for step in &outcome.steps {
        println!("  {step}");
    }
    if outcome.steps.is_empty() {
        println!("  {}", color::muted("nothing needed changing"));
    }
}
