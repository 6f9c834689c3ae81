//! `factionsync status`: what the mapping store says the bot has created.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use factionsync_core::FactionId;
use factionsync_sync::{MappingStore, SqliteStore};

use super::{open_store, prepare, print_json};

/// Arguments for `factionsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
struct FactionStatus {
    faction_id: i64,
    tag: Option<String>,
    name: Option<String>,
    role_id: Option<u64>,
    channel_id: Option<u64>,
    channel_name: Option<String>,
    created_at: Option<String>,
}

#[derive(Serialize)]
struct StatusJson {
    roles: usize,
    channels: usize,
    factions: Vec<FactionStatus>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "faction")]
    faction: i64,
    #[tabled(rename = "tag")]
    tag: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "channel")]
    channel: String,
    #[tabled(rename = "created")]
    created: String,
}

impl StatusArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = prepare(config_path)?;
        let store = open_store(&config)?;
        let rows = collect(&store).context("failed to read the mapping store")?;

        if self.json {
            return print_json(&StatusJson {
                roles: rows.iter().filter(|r| r.role_id.is_some()).count(),
                channels: rows.iter().filter(|r| r.channel_id.is_some()).count(),
                factions: rows,
            });
        }
        print_table(rows);
        Ok(())
    }
}

fn collect(store: &SqliteStore) -> Result<Vec<FactionStatus>> {
    let mut by_faction = BTreeMap::<FactionId, FactionStatus>::new();

    for record in store.list_role_records()? {
        let entry = by_faction.entry(record.faction_id).or_default();
        entry.role_id = Some(record.role_id.0);
        entry.created_at = Some(record.created_at.to_rfc3339());
    }
    for record in store.list_channel_records()? {
        let entry = by_faction.entry(record.faction_id).or_default();
        entry.channel_id = Some(record.channel_id.0);
        entry.channel_name = Some(record.resolved_name);
        entry.created_at.get_or_insert_with(|| record.created_at.to_rfc3339());
    }

    let mut rows = Vec::with_capacity(by_faction.len());
    for (id, mut status) in by_faction {
        status.faction_id = id.0;
        if let Some(faction) = store.get_faction(id)? {
            status.tag = Some(faction.tag);
            status.name = Some(faction.display_name);
        }
        rows.push(status);
    }
    Ok(rows)
}

fn print_table(rows: Vec<FactionStatus>) {
    println!(
        "factionsync v{} | {} factions with remote objects",
        env!("CARGO_PKG_VERSION"),
        rows.len()
    );
    if rows.is_empty() {
        println!("No roles or channels recorded.");
        return;
    }

    let incomplete = rows
        .iter()
        .filter(|r| r.role_id.is_none() || r.channel_id.is_none())
        .count();

    let table_rows: Vec<StatusRow> = rows
        .into_iter()
        .map(|r| StatusRow {
            faction: r.faction_id,
            tag: r.tag.unwrap_or_default(),
            name: r.name.unwrap_or_default(),
            role: r.role_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            channel: match (r.channel_id, r.channel_name) {
                (Some(id), Some(name)) => format!("#{name} ({id})"),
                _ => "-".to_string(),
            },
            created: r.created_at.unwrap_or_default(),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if incomplete > 0 {
        println!(
            "{}",
            format!("{incomplete} faction(s) are missing a role or channel; the next cycle completes them").yellow()
        );
    }
}
