//! Safe-teardown: delete exactly the remote objects the store says we made.
//!
//! Each deletion is an independent, individually fallible step. Missing
//! objects are not errors and platform-managed roles are never deleted. After
//! every step has been attempted both record tables are cleared in one batch.

use serde::Serialize;

use factionsync_core::FactionId;

use crate::error::{GatewayError, StoreError};
use crate::gateway::{ChannelId, RemoteGateway, RoleId};
use crate::store::MappingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TeardownTarget {
    Channel(ChannelId),
    Role(RoleId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TeardownOutcome {
    Deleted,
    AlreadyMissing,
    Protected,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownStep {
    pub faction_id: FactionId,
    pub target: TeardownTarget,
    pub outcome: TeardownOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub steps: Vec<TeardownStep>,
}

impl TeardownReport {
    pub fn count(&self, outcome: &TeardownOutcome) -> usize {
        self.steps.iter().filter(|s| &s.outcome == outcome).count()
    }

    pub fn deleted(&self) -> usize {
        self.count(&TeardownOutcome::Deleted)
    }

    pub fn failed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, TeardownOutcome::Failed { .. }))
            .count()
    }
}

/// Run safe-teardown against `store` and `gateway`.
///
/// Only a failure to read or clear the record tables is an error; remote
/// failures are reported per step.
pub fn teardown<S, G>(store: &mut S, gateway: &G) -> Result<TeardownReport, StoreError>
where
    S: MappingStore + ?Sized,
    G: RemoteGateway + ?Sized,
{
    tracing::info!("safe teardown started");

    let channels = store.list_channel_records()?;
    let roles = store.list_role_records()?;
    let mut report = TeardownReport::default();

    for record in channels {
        let outcome = delete_channel(gateway, record.channel_id);
        log_step(record.faction_id, "channel", record.channel_id.0, &outcome);
        report.steps.push(TeardownStep {
            faction_id: record.faction_id,
            target: TeardownTarget::Channel(record.channel_id),
            outcome,
        });
    }

    for record in roles {
        let outcome = delete_role(gateway, record.role_id);
        log_step(record.faction_id, "role", record.role_id.0, &outcome);
        report.steps.push(TeardownStep {
            faction_id: record.faction_id,
            target: TeardownTarget::Role(record.role_id),
            outcome,
        });
    }

    clear_records(store)?;
    tracing::info!(
        deleted = report.deleted(),
        failed = report.failed(),
        "safe teardown finished, records cleared"
    );
    Ok(report)
}

fn delete_channel<G: RemoteGateway + ?Sized>(gateway: &G, id: ChannelId) -> TeardownOutcome {
    let handle = match gateway.get_channel(id) {
        Ok(Some(handle)) => handle,
        Ok(None) => return TeardownOutcome::AlreadyMissing,
        Err(err) => return failed(err),
    };
    match gateway.delete_channel(&handle) {
        Ok(()) => TeardownOutcome::Deleted,
        Err(err) => failed(err),
    }
}

fn delete_role<G: RemoteGateway + ?Sized>(gateway: &G, id: RoleId) -> TeardownOutcome {
    let handle = match gateway.get_role(id) {
        Ok(Some(handle)) if handle.managed => return TeardownOutcome::Protected,
        Ok(Some(handle)) => handle,
        Ok(None) => return TeardownOutcome::AlreadyMissing,
        Err(err) => return failed(err),
    };
    match gateway.delete_role(&handle) {
        Ok(()) => TeardownOutcome::Deleted,
        Err(err) => failed(err),
    }
}

fn failed(err: GatewayError) -> TeardownOutcome {
    match err {
        GatewayError::NotFound => TeardownOutcome::AlreadyMissing,
        GatewayError::Protected => TeardownOutcome::Protected,
        other => TeardownOutcome::Failed {
            error: other.to_string(),
        },
    }
}

fn clear_records<S: MappingStore + ?Sized>(store: &mut S) -> Result<(), StoreError> {
    store.begin()?;
    let cleared = store
        .clear_channel_records()
        .and_then(|()| store.clear_role_records());
    match cleared {
        Ok(()) => store.commit(),
        Err(err) => {
            if let Err(rollback_err) = store.rollback() {
                tracing::error!(error = %rollback_err, "rollback after failed record clear failed");
            }
            Err(err)
        }
    }
}

fn log_step(faction_id: FactionId, kind: &str, id: u64, outcome: &TeardownOutcome) {
    match outcome {
        TeardownOutcome::Deleted => {
            tracing::info!(faction_id = %faction_id, kind, id, "deleted remote object");
        }
        TeardownOutcome::AlreadyMissing => {
            tracing::warn!(faction_id = %faction_id, kind, id, "remote object already gone, skipping");
        }
        TeardownOutcome::Protected => {
            tracing::warn!(faction_id = %faction_id, kind, id, "remote object is platform-managed, not deleting");
        }
        TeardownOutcome::Failed { error } => {
            tracing::error!(faction_id = %faction_id, kind, id, error = %error, "remote delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CategoryId;
    use crate::memory::{GatewayCall, InMemoryGateway};
    use crate::store::SqliteStore;

    #[test]
    fn empty_store_is_a_noop() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let gateway = InMemoryGateway::new();
        let report = teardown(&mut store, &gateway).unwrap();
        assert!(report.steps.is_empty());
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn managed_role_is_protected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let gateway = InMemoryGateway::new();
        let managed = gateway.seed_role("Server Booster", true);
        store.put_role_record(FactionId(1), managed).unwrap();

        let report = teardown(&mut store, &gateway).unwrap();
        assert_eq!(report.steps[0].outcome, TeardownOutcome::Protected);
        assert!(gateway.role(managed).is_some());
        assert!(!gateway
            .calls()
            .contains(&GatewayCall::DeleteRole { id: managed }));
        assert!(store.list_role_records().unwrap().is_empty());
    }

    #[test]
    fn missing_channel_is_skipped_not_fatal() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let gateway = InMemoryGateway::new();
        let gone = gateway.seed_channel("old", CategoryId(5));
        gateway.remove_channel(gone);
        let alive = gateway.seed_channel("reds", CategoryId(5));
        store.put_channel_record(FactionId(1), gone, "old").unwrap();
        store.put_channel_record(FactionId(2), alive, "reds").unwrap();

        let report = teardown(&mut store, &gateway).unwrap();
        let outcomes: Vec<_> = report.steps.iter().map(|s| s.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![TeardownOutcome::AlreadyMissing, TeardownOutcome::Deleted]
        );
        assert_eq!(gateway.channel_count(), 0);
    }

    #[test]
    fn not_found_and_protected_errors_map_to_outcomes() {
        assert_eq!(failed(GatewayError::NotFound), TeardownOutcome::AlreadyMissing);
        assert_eq!(failed(GatewayError::Protected), TeardownOutcome::Protected);
        assert!(matches!(
            failed(GatewayError::Transport("reset".into())),
            TeardownOutcome::Failed { .. }
        ));
    }
}
