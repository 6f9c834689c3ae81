//! factionsync core library: the snapshot model and operator configuration.
//!
//! - [`types`]: identities and snapshot entities
//! - [`snapshot`]: save-file parsing into a validated [`Snapshot`]
//! - [`config`]: operator directives
//! - [`error`]: [`SnapshotError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod snapshot;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, SnapshotError};
pub use snapshot::Snapshot;
pub use types::{FactionEntity, FactionId, MemberEntity, MemberId};
