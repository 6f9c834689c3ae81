//! `factionsync sync`: one reconciliation cycle, then exit.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use factionsync_sync::{ChannelOutcome, CycleReport, RoleOutcome};

use super::{discord_gateway, engine_with, prepare, print_json};

/// Arguments for `factionsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Emit the cycle report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct CycleRow {
    #[tabled(rename = "faction")]
    faction: i64,
    #[tabled(rename = "tag")]
    tag: String,
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "channel")]
    channel: String,
}

impl SyncArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = prepare(config_path)?;
        let mut engine = engine_with(&config, discord_gateway(&config)?)?;
        let report = engine
            .run_cycle_from_path(&config.snapshot_path)
            .context("reconciliation cycle aborted")?;

        if self.json {
            return print_json(&report);
        }
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &CycleReport) {
    println!(
        "{} factions seen | {} primary | {} roles created | {} channels created | {} members unlinked",
        report.factions_seen,
        report.primary_factions,
        report.roles_created(),
        report.channels_created(),
        report.members_unlinked,
    );
    if report.factions.is_empty() {
        println!("Nothing to reconcile.");
        return;
    }

    let rows: Vec<CycleRow> = report
        .factions
        .iter()
        .map(|f| CycleRow {
            faction: f.faction_id.0,
            tag: f.tag.clone(),
            role: role_label(&f.role),
            channel: channel_label(&f.channel),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let failures = report.failures();
    if failures > 0 {
        println!(
            "{}",
            format!("{failures} faction(s) failed; they will be retried next cycle").yellow()
        );
    }
}

fn role_label(outcome: &RoleOutcome) -> String {
    match outcome {
        RoleOutcome::Created { role_id } => format!("created {role_id}"),
        RoleOutcome::Reused { role_id } => format!("reused {role_id}"),
        RoleOutcome::Missing { role_id } => format!("missing {role_id}"),
        RoleOutcome::Failed { error } => format!("failed: {error}"),
    }
}

fn channel_label(outcome: &ChannelOutcome) -> String {
    match outcome {
        ChannelOutcome::Created { name, .. } => format!("created #{name}"),
        ChannelOutcome::Kept { name, .. } => format!("kept #{name}"),
        ChannelOutcome::Skipped { reason } => format!("skipped: {reason}"),
        ChannelOutcome::Failed { error } => format!("failed: {error}"),
    }
}
