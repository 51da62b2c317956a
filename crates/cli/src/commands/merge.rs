// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lk merge`: atomically merge a WU's lane branch into the trunk

use anyhow::Result;
use clap::Args;
use lk_core::WuId;
use lk_engine::{MergeOutcome, MergeRequest};
use lk_storage::{AcquireOptions, Resource};

use crate::app::App;
use crate::color;
use crate::commands::wu_entry;
use crate::exit_error::remediable;

#[derive(Args)]
pub struct MergeArgs {
    /// WU whose lane branch is merged
    #[arg(long)]
    pub wu: String,
    /// Lane branch (default: the claimed branch, else `lane/<lane>/<wu>`)
    #[arg(long)]
    pub branch: Option<String>,
    /// Override the configured number of rebase attempts
    #[arg(long)]
    pub retries: Option<u32>,
}

pub async fn handle(args: MergeArgs, app: &App) -> Result<()> {
    let wu_id = WuId::from(args.wu.as_str());
    let entry = wu_entry(app, &wu_id)?;
    let branch = args
        .branch
        .or_else(|| entry.branch.clone())
        .unwrap_or_else(|| lk_core::wu::lane_branch_name(&entry.lane, &wu_id));

    let mut req = MergeRequest::new(wu_id.clone(), branch);
    req.lane_worktree = entry.worktree_path.filter(|p| p.exists());
    req.retries = args.retries;

    let locks = app
        .locks()
        .lock_ordered(&[Resource::merge()], wu_id.as_str(), AcquireOptions::default())
        .await
        .map_err(remediable)?;
    let result = app.merge_executor().atomic_merge(&req).await;
    locks.release().map_err(remediable)?;
    let outcome = result.map_err(remediable)?;

    app.format.emit(&outcome, print_outcome)
}

fn print_outcome(outcome: &MergeOutcome) {
    let id = color::header(outcome.wu_id.as_str());
    if outcome.already_merged {
        println!("{id} is already on trunk at {}", lk_core::short(&outcome.merged_sha, 8));
        return;
    }
    println!(
        "{id} merged: {} -> {} ({} attempt(s))",
        lk_core::short(&outcome.trunk_before, 8),
        lk_core::short(&outcome.merged_sha, 8),
        outcome.attempts
    );
    if !outcome.local_trunk_updated {
        let note = "local trunk was not fast-forwarded; run `git pull` when convenient";
        println!("{}", color::muted(note));
    }
}
