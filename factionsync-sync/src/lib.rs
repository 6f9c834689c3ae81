//! # factionsync-sync
//!
//! Reconciliation between the save-file snapshot, the mapping store, and the
//! remote platform.
//!
//! Build an [`Engine`] from a [`MappingStore`] and a [`RemoteGateway`], then
//! call [`Engine::run_cycle`] on each tick. [`teardown`] removes everything
//! the engine ever created.

pub mod engine;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod plan;
pub mod store;
pub mod teardown;

pub use engine::{
    ChannelOutcome, CycleReport, Engine, EngineSettings, FactionReport, PlannedFaction,
    RoleOutcome,
};
pub use error::{GatewayError, StoreError, SyncError};
pub use gateway::{
    text_channel_name, CategoryId, ChannelHandle, ChannelId, GuildId, RemoteGateway, RoleHandle,
    RoleId, VisibilityRule,
};
pub use memory::InMemoryGateway;
pub use store::{ChannelRecord, MappingStore, RoleRecord, SqliteStore};
pub use teardown::{teardown, TeardownOutcome, TeardownReport, TeardownStep, TeardownTarget};
