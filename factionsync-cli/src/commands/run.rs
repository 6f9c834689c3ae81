//! `factionsync run`: the long-running reconciler.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use factionsync_daemon::{start_blocking, RunOptions};

use super::{discord_gateway, engine_with, prepare, teardown};

/// Arguments for `factionsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run teardown once instead of the sync loop (same as `delete_all: true`).
    #[arg(long)]
    pub teardown: bool,
}

impl RunArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = prepare(config_path)?;
        let engine = engine_with(&config, discord_gateway(&config)?)?;
        let options = RunOptions::from_config(&config, self.teardown);

        let summary = start_blocking(engine, options).context("runtime failed")?;
        match &summary.teardown {
            Some(report) => teardown::print_report(report),
            None => println!(
                "{} stopped after {} cycles ({} aborted)",
                "✓".green(),
                summary.cycles,
                summary.failed_cycles
            ),
        }
        Ok(())
    }
}
