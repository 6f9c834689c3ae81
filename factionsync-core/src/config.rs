//! Operator directives, read once at startup.
//!
//! # File layout
//!
//! ```yaml
//! guild_id: 112233445566778899
//! category_id: 998877665544332211
//! snapshot_path: /srv/se/Saves/World/Sandbox.sbc
//! database_path: factionsync.db
//! sync_interval_secs: 300
//! delete_all: false
//! delete_unused: false
//! debug: false
//! ```
//!
//! The bot token is never stored in the file; it comes from
//! [`TOKEN_ENV`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/factionsync.yaml";

/// Environment variable holding the bot token.
pub const TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";

/// Parsed operator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub guild_id: u64,
    pub category_id: u64,
    pub snapshot_path: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// Run Safe-Teardown instead of the sync loop, then exit.
    #[serde(default)]
    pub delete_all: bool,
    /// Accepted for compatibility; no behaviour is attached to it yet.
    #[serde(default)]
    pub delete_unused: bool,
    #[serde(default)]
    pub debug: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("factionsync.db")
}

fn default_sync_interval_secs() -> u64 {
    300
}

impl Config {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.sync_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sync_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.guild_id == 0 {
            return Err(ConfigError::Invalid {
                field: "guild_id",
                reason: "must be a non-zero snowflake".to_string(),
            });
        }
        if self.category_id == 0 {
            return Err(ConfigError::Invalid {
                field: "category_id",
                reason: "must be a non-zero snowflake".to_string(),
            });
        }
        Ok(self)
    }
}

/// Load and validate the config file at `path`.
///
/// Relative `snapshot_path` / `database_path` entries are kept as written and
/// resolve against the process working directory.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()
}

/// Read the bot token from [`TOKEN_ENV`].
pub fn bot_token() -> Result<String, ConfigError> {
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_owned()),
        _ => Err(ConfigError::MissingEnv(TOKEN_ENV)),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("factionsync.yaml");
        std::fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(
            &dir,
            "guild_id: 1\ncategory_id: 2\nsnapshot_path: Sandbox.sbc\n",
        );
        let config = load_at(&path).expect("load");
        assert_eq!(config.sync_interval(), Duration::from_secs(300));
        assert_eq!(config.database_path, PathBuf::from("factionsync.db"));
        assert!(!config.delete_all);
        assert!(!config.delete_unused);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(
            &dir,
            "guild_id: 1\ncategory_id: 2\nsnapshot_path: s\nsync_interval_secs: 0\n",
        );
        let err = load_at(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "sync_interval_secs",
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_at(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("nope.yaml"));
    }
}
