//! `factionsync teardown`: delete everything the bot created.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use factionsync_sync::{TeardownOutcome, TeardownReport, TeardownTarget};

use super::{discord_gateway, engine_with, prepare};

/// Arguments for `factionsync teardown`.
#[derive(Args, Debug)]
pub struct TeardownArgs {}

impl TeardownArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = prepare(config_path)?;
        let mut engine = engine_with(&config, discord_gateway(&config)?)?;
        let report = engine.teardown().context("teardown failed")?;
        print_report(&report);
        Ok(())
    }
}

pub(crate) fn print_report(report: &TeardownReport) {
    for step in &report.steps {
        let target = match step.target {
            TeardownTarget::Channel(id) => format!("channel {id}"),
            TeardownTarget::Role(id) => format!("role {id}"),
        };
        let outcome = match &step.outcome {
            TeardownOutcome::Deleted => "deleted".green().to_string(),
            TeardownOutcome::AlreadyMissing => "already gone".bright_black().to_string(),
            TeardownOutcome::Protected => "protected, skipped".yellow().to_string(),
            TeardownOutcome::Failed { error } => format!("failed: {error}").red().to_string(),
        };
        println!("  faction {} {target}: {outcome}", step.faction_id);
    }
    println!(
        "{} deleted | {} failed | records cleared",
        report.deleted(),
        report.failed()
    );
}
