pub mod plan;
pub mod run;
pub mod status;
pub mod sync;
pub mod teardown;

use std::path::Path;

use anyhow::{Context, Result};

use factionsync_core::config::{bot_token, load_at};
use factionsync_core::Config;
use factionsync_discord::DiscordGateway;
use factionsync_sync::{CategoryId, Engine, EngineSettings, GuildId, RemoteGateway, SqliteStore};

/// Load the config and install logging at the level it asks for.
pub(crate) fn prepare(path: &Path) -> Result<Config> {
    let config = load_at(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    factionsync_daemon::init_tracing(config.debug);
    if config.delete_unused {
        tracing::warn!("delete_unused is set but has no effect; unused objects are never deleted");
    }
    Ok(config)
}

pub(crate) fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database_path).with_context(|| {
        format!(
            "failed to open mapping store at {}",
            config.database_path.display()
        )
    })
}

pub(crate) fn discord_gateway(config: &Config) -> Result<DiscordGateway> {
    let token = bot_token().context("a bot token is required for this command")?;
    Ok(DiscordGateway::new(&token, GuildId(config.guild_id)))
}

pub(crate) fn engine_with<G: RemoteGateway>(
    config: &Config,
    gateway: G,
) -> Result<Engine<SqliteStore, G>> {
    let store = open_store(config)?;
    Ok(Engine::new(
        store,
        gateway,
        EngineSettings {
            category: CategoryId(config.category_id),
        },
    ))
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}
