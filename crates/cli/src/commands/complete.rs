// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lk complete`: drive a WU through the completion pipeline

use anyhow::Result;
use clap::Args;
use lk_core::WuId;
use lk_engine::CompletionReport;

use crate::app::App;
use crate::color;
use crate::exit_error::{remediable, ExitError, FAILED};

#[derive(Args)]
pub struct CompleteArgs {
    /// WU to complete
    #[arg(long)]
    pub wu: String,
    /// Continue from the saved stage instead of starting over
    #[arg(long)]
    pub resume: bool,
    /// Gates already ran in this worktree; skip them
    #[arg(long)]
    pub prep_passed: bool,
    /// Process whose liveness keeps the lane lock valid (default: the caller)
    #[arg(long)]
    pub pid: Option<u32>,
}

pub async fn handle(args: CompleteArgs, app: &App) -> Result<()> {
    let wu_id = WuId::from(args.wu.as_str());
    let pid = args.pid.unwrap_or_else(std::os::unix::process::parent_id);
    let mut pipeline = app.pipeline(pid);
    let report =
        pipeline.complete(&wu_id, args.resume, args.prep_passed).await.map_err(remediable)?;
    app.format.emit(&report, print_report)?;
    if report.succeeded() {
        return Ok(());
    }
    let stage = report
        .context
        .failed_at
        .map(|s| s.to_string())
        .unwrap_or_else(|| report.stage.to_string());
    let reason = report.context.error.clone().unwrap_or_else(|| "unknown error".to_string());
    Err(ExitError::new(FAILED, format!("completion of {wu_id} failed at {stage}: {reason}"))
        .with_next(report.next_step.clone())
        .into())
}

fn print_report(report: &CompletionReport) {
    if !report.succeeded() {
        // Failure details go to stderr with the exit error
        return;
    }
    let detail = match &report.merge {
        Some(m) if m.already_merged => "already on trunk".to_string(),
        Some(m) => {
            format!("merged {} after {} attempt(s)", lk_core::short(&m.merged_sha, 8), m.attempts)
        }
        None => "merged".to_string(),
    };
    let retries = report.context.retry_count;
    let suffix = match retries {
        0 => String::new(),
        1 => ", 1 retry".to_string(),
        n => format!(", {n} retries"),
    };
    println!("{} {} ({detail}{suffix})", color::header(report.wu_id.as_str()), color::good("done"));
}
