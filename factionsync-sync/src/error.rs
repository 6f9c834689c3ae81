//! Error types for factionsync-sync.

use thiserror::Error;

use factionsync_core::FactionId;

/// Persistence failures. Any of these aborts the current cycle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A second role/channel record for a faction that already has one.
    #[error("{kind} record for faction {faction_id} already exists")]
    DuplicateRecord {
        kind: &'static str,
        faction_id: FactionId,
    },

    /// A stored value could not be decoded back into its domain type.
    #[error("corrupt {column} value in store: {value}")]
    Corrupt { column: &'static str, value: String },
}

/// Failures reported by a remote gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The referenced remote object does not exist.
    #[error("remote object not found")]
    NotFound,

    /// The platform rejected a name as a duplicate.
    #[error("remote platform rejected duplicate name '{name}'")]
    Conflict { name: String },

    /// The object is platform-managed and must not be touched.
    #[error("remote object is platform-managed")]
    Protected,

    /// Any other non-success HTTP status.
    #[error("remote platform returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection-level failure before a status was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// A response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Cycle-level failures. Per-faction gateway failures are not errors at this
/// level; they land in the cycle report.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Gateway failure outside any single faction, e.g. during planning.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}
