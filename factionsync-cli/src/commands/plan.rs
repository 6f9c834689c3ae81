//! `factionsync plan`: dry run of the next cycle.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use factionsync_core::{snapshot, Snapshot};
use factionsync_sync::{
    plan::{ChannelPlan, RolePlan},
    Engine, InMemoryGateway, PlannedFaction, RemoteGateway, SqliteStore,
};

use super::{discord_gateway, engine_with, prepare, print_json};

/// Arguments for `factionsync plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Plan against an empty in-memory guild instead of Discord. No token
    /// needed; channel names are resolved as if the category were empty.
    #[arg(long)]
    pub offline: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "faction")]
    faction: i64,
    #[tabled(rename = "tag")]
    tag: String,
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "channel")]
    channel: String,
}

impl PlanArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = prepare(config_path)?;
        let snapshot = snapshot::load(&config.snapshot_path).context("cannot plan without a save file")?;

        let planned = if self.offline {
            plan_with(&engine_with(&config, InMemoryGateway::new())?, &snapshot)?
        } else {
            plan_with(&engine_with(&config, discord_gateway(&config)?)?, &snapshot)?
        };

        if self.json {
            return print_json(&planned);
        }
        print_table(planned);
        Ok(())
    }
}

fn plan_with<G: RemoteGateway>(
    engine: &Engine<SqliteStore, G>,
    snapshot: &Snapshot,
) -> Result<Vec<PlannedFaction>> {
    engine.plan(snapshot).context("planning failed")
}

fn print_table(planned: Vec<PlannedFaction>) {
    if planned.is_empty() {
        println!("No primary factions in the save file.");
        return;
    }
    let creates = planned
        .iter()
        .filter(|p| matches!(p.plan.role, RolePlan::Create { .. }))
        .count();

    let rows: Vec<PlanRow> = planned
        .into_iter()
        .map(|p| PlanRow {
            faction: p.plan.faction_id.0,
            tag: p.plan.tag,
            role: match p.plan.role {
                RolePlan::Reuse { role_id } => format!("reuse {role_id}"),
                RolePlan::Create { name } => format!("create '{name}'"),
            },
            channel: match (p.plan.channel, p.resolved_channel_name) {
                (ChannelPlan::Keep { name, .. }, _) => format!("keep #{name}"),
                (ChannelPlan::Create { .. }, Some(name)) => format!("create #{name}"),
                (ChannelPlan::Create { base_name }, None) => format!("create #{base_name}"),
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{creates} role(s) would be created.");
}
