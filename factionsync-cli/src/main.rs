//! factionsync: mirror Space Engineers factions into Discord roles and
//! private channels.
//!
//! # Usage
//!
//! ```text
//! factionsync [--config PATH] run [--teardown]
//! factionsync [--config PATH] sync [--json]
//! factionsync [--config PATH] plan [--offline] [--json]
//! factionsync [--config PATH] status [--json]
//! factionsync [--config PATH] teardown
//! ```
//!
//! The bot token is read from `DISCORD_BOT_TOKEN`.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    plan::PlanArgs, run::RunArgs, status::StatusArgs, sync::SyncArgs, teardown::TeardownArgs,
};
use factionsync_core::config::DEFAULT_CONFIG_PATH;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "factionsync",
    version,
    about = "Mirror Space Engineers factions into Discord roles and channels",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile on the configured interval until ctrl-c.
    Run(RunArgs),

    /// Run a single reconciliation cycle and print its report.
    Sync(SyncArgs),

    /// Show what the next cycle would create, without changing anything.
    Plan(PlanArgs),

    /// List the roles and channels recorded in the mapping store.
    Status(StatusArgs),

    /// Delete every recorded role and channel, then exit.
    Teardown(TeardownArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(&cli.config),
        Commands::Sync(args) => args.run(&cli.config),
        Commands::Plan(args) => args.run(&cli.config),
        Commands::Status(args) => args.run(&cli.config),
        Commands::Teardown(args) => args.run(&cli.config),
    }
}
