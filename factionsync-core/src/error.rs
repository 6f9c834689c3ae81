//! Error types for factionsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from reading the save-file snapshot.
///
/// The reconciliation engine degrades every variant to an empty snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The save file is missing or unreadable.
    #[error("snapshot source unavailable at {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The save file is not well-formed XML.
    #[error("snapshot at {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
}

/// Fatal startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file.
    #[error("cannot read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A value is present but unusable.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// A required environment variable is unset or empty.
    #[error("environment variable {0} is missing or empty")]
    MissingEnv(&'static str),
}
