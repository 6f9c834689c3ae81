//! Reconciliation engine: one diff-and-apply pass between snapshot, mapping
//! store, and remote platform.
//!
//! # Cycle
//!
//! 1. Record every faction (primary or not) in the store.
//! 2. Upsert every member and link it to its owning faction.
//! 3. Unlink stored members absent from the snapshot (rows are kept).
//! 4. For each primary faction, in snapshot order: reuse-or-create the role,
//!    then keep-or-create the channel.
//!
//! Steps 1 to 3 commit as one batch. Each record written in step 4 is durable as
//! soon as its remote object exists, so a crash leaves every faction either
//! reconciled or resumable. Factions missing from the snapshot are never
//! touched; only [`teardown`](crate::teardown) removes remote objects.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use factionsync_core::{snapshot, FactionEntity, FactionId, Snapshot};

use crate::error::{GatewayError, StoreError, SyncError};
use crate::gateway::{faction_visibility, CategoryId, ChannelId, RemoteGateway, RoleId};
use crate::plan::{plan_faction, resolve_channel_name, ChannelPlan, FactionPlan, RolePlan};
use crate::store::MappingStore;
use crate::teardown::{self, TeardownReport};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RoleOutcome {
    Created { role_id: RoleId },
    Reused { role_id: RoleId },
    /// The record points at a role that no longer exists remotely.
    Missing { role_id: RoleId },
    Failed { error: String },
}

impl RoleOutcome {
    /// Role usable for channel visibility this cycle.
    pub fn usable_role(&self) -> Option<RoleId> {
        match self {
            RoleOutcome::Created { role_id } | RoleOutcome::Reused { role_id } => Some(*role_id),
            RoleOutcome::Missing { .. } | RoleOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Created { channel_id: ChannelId, name: String },
    Kept { channel_id: ChannelId, name: String },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactionReport {
    pub faction_id: FactionId,
    pub tag: String,
    pub role: RoleOutcome,
    pub channel: ChannelOutcome,
}

/// Result of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub factions_seen: usize,
    pub primary_factions: usize,
    pub members_linked: usize,
    pub members_unlinked: usize,
    pub factions: Vec<FactionReport>,
}

impl CycleReport {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            factions_seen: 0,
            primary_factions: 0,
            members_linked: 0,
            members_unlinked: 0,
            factions: Vec::new(),
        }
    }

    pub fn roles_created(&self) -> usize {
        self.factions
            .iter()
            .filter(|f| matches!(f.role, RoleOutcome::Created { .. }))
            .count()
    }

    pub fn channels_created(&self) -> usize {
        self.factions
            .iter()
            .filter(|f| matches!(f.channel, ChannelOutcome::Created { .. }))
            .count()
    }

    /// Factions whose role or channel step failed this cycle.
    pub fn failures(&self) -> usize {
        self.factions
            .iter()
            .filter(|f| {
                matches!(f.role, RoleOutcome::Failed { .. })
                    || matches!(f.channel, ChannelOutcome::Failed { .. })
            })
            .count()
    }
}

/// Dry-run entry: the plan plus the channel name creation would claim now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFaction {
    #[serde(flatten)]
    pub plan: FactionPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_channel_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Category that owns every faction channel.
    pub category: CategoryId,
}

/// Reconciliation engine over an injected store and gateway.
///
/// Not reentrant: every operation takes `&mut self`, so one engine value can
/// only ever run one cycle at a time.
pub struct Engine<S, G> {
    store: S,
    gateway: G,
    settings: EngineSettings,
}

struct Bookkeeping {
    members_linked: usize,
    members_unlinked: usize,
}

impl<S: MappingStore, G: RemoteGateway> Engine<S, G> {
    pub fn new(store: S, gateway: G, settings: EngineSettings) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn into_parts(self) -> (S, G) {
        (self.store, self.gateway)
    }

    /// Load the save file at `path` and run a cycle on it.
    ///
    /// An unavailable or malformed save file reconciles nothing.
    pub fn run_cycle_from_path(&mut self, path: &Path) -> Result<CycleReport, SyncError> {
        let snapshot = snapshot::load_or_empty(path);
        self.run_cycle(&snapshot)
    }

    /// Run one reconciliation cycle against `snapshot`.
    ///
    /// Store failures abort the cycle. Gateway failures are confined to the
    /// faction they happened in and reported in [`CycleReport::factions`].
    pub fn run_cycle(&mut self, snapshot: &Snapshot) -> Result<CycleReport, SyncError> {
        let started_at = Utc::now();
        if snapshot.is_empty() {
            tracing::info!("empty snapshot, nothing to reconcile");
            return Ok(CycleReport::empty(started_at));
        }

        let bookkeeping = self.record_snapshot(snapshot)?;

        let mut factions = Vec::new();
        for faction in snapshot.primary_factions() {
            factions.push(self.reconcile_faction(faction)?);
        }

        let report = CycleReport {
            started_at,
            factions_seen: snapshot.factions().len(),
            primary_factions: factions.len(),
            members_linked: bookkeeping.members_linked,
            members_unlinked: bookkeeping.members_unlinked,
            factions,
        };
        tracing::info!(
            factions = report.factions_seen,
            primary = report.primary_factions,
            roles_created = report.roles_created(),
            channels_created = report.channels_created(),
            failures = report.failures(),
            "reconciliation cycle finished",
        );
        Ok(report)
    }

    /// Decide what a cycle would do without creating anything or writing to
    /// the store. New channel names are resolved against the live siblings,
    /// counting names claimed earlier in the same plan as taken.
    pub fn plan(&self, snapshot: &Snapshot) -> Result<Vec<PlannedFaction>, SyncError> {
        let mut plans = Vec::new();
        for faction in snapshot.primary_factions() {
            let role = self.store.get_role_record(faction.id)?;
            let channel = self.store.get_channel_record(faction.id)?;
            plans.push(plan_faction(faction, role.as_ref(), channel.as_ref()));
        }

        let needs_names = plans
            .iter()
            .any(|p| matches!(p.channel, ChannelPlan::Create { .. }));
        let mut taken = if needs_names {
            self.gateway
                .list_sibling_channel_names(self.settings.category)?
        } else {
            BTreeSet::new()
        };

        Ok(plans
            .into_iter()
            .map(|plan| {
                let resolved_channel_name = match &plan.channel {
                    ChannelPlan::Create { base_name } => {
                        let base = self.gateway.normalize_channel_name(base_name);
                        let name = resolve_channel_name(&base, &taken);
                        taken.insert(name.clone());
                        Some(name)
                    }
                    ChannelPlan::Keep { .. } => None,
                };
                PlannedFaction {
                    plan,
                    resolved_channel_name,
                }
            })
            .collect())
    }

    /// Delete every recorded remote object and clear the records.
    pub fn teardown(&mut self) -> Result<TeardownReport, StoreError> {
        teardown::teardown(&mut self.store, &self.gateway)
    }

    // -- steps 1-3 ----------------------------------------------------------

    fn record_snapshot(&mut self, snapshot: &Snapshot) -> Result<Bookkeeping, StoreError> {
        self.store.begin()?;
        let batch = self
            .record_snapshot_in_batch(snapshot)
            .and_then(|bookkeeping| self.store.commit().map(|()| bookkeeping));
        match batch {
            Ok(bookkeeping) => Ok(bookkeeping),
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback() {
                    tracing::error!(error = %rollback_err, "rollback after failed bookkeeping failed");
                }
                Err(err)
            }
        }
    }

    fn record_snapshot_in_batch(&mut self, snapshot: &Snapshot) -> Result<Bookkeeping, StoreError> {
        for faction in snapshot.factions() {
            self.store.upsert_faction(faction)?;
            for member in &faction.member_ids {
                self.store.upsert_member(*member)?;
                self.store.set_membership(*member, Some(faction.id))?;
            }
        }

        let present = snapshot.member_ids();
        let mut members_unlinked = 0;
        for member in self.store.list_member_ids()? {
            if !present.contains(&member) {
                self.store.set_membership(member, None)?;
                members_unlinked += 1;
            }
        }

        Ok(Bookkeeping {
            members_linked: present.len(),
            members_unlinked,
        })
    }

    // -- step 4 -------------------------------------------------------------

    fn reconcile_faction(&mut self, faction: &FactionEntity) -> Result<FactionReport, StoreError> {
        let role_record = self.store.get_role_record(faction.id)?;
        let channel_record = self.store.get_channel_record(faction.id)?;
        let plan = plan_faction(faction, role_record.as_ref(), channel_record.as_ref());

        let role = self.apply_role(faction.id, &plan.role)?;
        let channel = self.apply_channel(faction.id, &plan.channel, &role)?;

        Ok(FactionReport {
            faction_id: faction.id,
            tag: faction.tag.clone(),
            role,
            channel,
        })
    }

    fn apply_role(&mut self, faction_id: FactionId, plan: &RolePlan) -> Result<RoleOutcome, StoreError> {
        match plan {
            RolePlan::Reuse { role_id } => match self.gateway.get_role(*role_id) {
                Ok(Some(_)) => {
                    tracing::debug!(faction_id = %faction_id, role_id = %role_id, "reusing role");
                    Ok(RoleOutcome::Reused { role_id: *role_id })
                }
                Ok(None) => {
                    tracing::warn!(faction_id = %faction_id, role_id = %role_id, "recorded role is gone remotely");
                    Ok(RoleOutcome::Missing { role_id: *role_id })
                }
                Err(err) => {
                    tracing::error!(faction_id = %faction_id, role_id = %role_id, error = %err, "role lookup failed");
                    Ok(RoleOutcome::Failed {
                        error: err.to_string(),
                    })
                }
            },
            RolePlan::Create { name } => match self.gateway.create_role(name) {
                Ok(handle) => {
                    self.store.put_role_record(faction_id, handle.id)?;
                    tracing::info!(faction_id = %faction_id, role_id = %handle.id, name = %name, "created role");
                    Ok(RoleOutcome::Created { role_id: handle.id })
                }
                Err(err) => {
                    log_create_failure("role", faction_id, name, &err);
                    Ok(RoleOutcome::Failed {
                        error: err.to_string(),
                    })
                }
            },
        }
    }

    fn apply_channel(
        &mut self,
        faction_id: FactionId,
        plan: &ChannelPlan,
        role: &RoleOutcome,
    ) -> Result<ChannelOutcome, StoreError> {
        let base_name = match plan {
            ChannelPlan::Keep { channel_id, name } => {
                tracing::debug!(faction_id = %faction_id, channel_id = %channel_id, "channel already recorded, skipping");
                return Ok(ChannelOutcome::Kept {
                    channel_id: *channel_id,
                    name: name.clone(),
                });
            }
            ChannelPlan::Create { base_name } => base_name,
        };

        let Some(role_id) = role.usable_role() else {
            tracing::warn!(faction_id = %faction_id, "no usable role, channel creation deferred");
            return Ok(ChannelOutcome::Skipped {
                reason: "faction role unavailable".to_string(),
            });
        };

        let category = self.settings.category;
        let siblings = match self.gateway.list_sibling_channel_names(category) {
            Ok(siblings) => siblings,
            Err(err) => {
                tracing::error!(faction_id = %faction_id, error = %err, "listing sibling channels failed");
                return Ok(ChannelOutcome::Failed {
                    error: err.to_string(),
                });
            }
        };
        let base = self.gateway.normalize_channel_name(base_name);
        let name = resolve_channel_name(&base, &siblings);

        match self
            .gateway
            .create_channel(&name, category, &faction_visibility(role_id))
        {
            Ok(handle) => {
                // Record what the platform assigned, not what was asked for.
                if handle.name != name {
                    tracing::debug!(faction_id = %faction_id, requested = %name, assigned = %handle.name, "platform renamed channel");
                }
                self.store
                    .put_channel_record(faction_id, handle.id, &handle.name)?;
                tracing::info!(faction_id = %faction_id, channel_id = %handle.id, name = %handle.name, "created channel");
                Ok(ChannelOutcome::Created {
                    channel_id: handle.id,
                    name: handle.name,
                })
            }
            Err(err) => {
                log_create_failure("channel", faction_id, &name, &err);
                Ok(ChannelOutcome::Failed {
                    error: err.to_string(),
                })
            }
        }
    }
}

fn log_create_failure(kind: &str, faction_id: FactionId, name: &str, err: &GatewayError) {
    match err {
        GatewayError::Conflict { .. } => {
            tracing::warn!(faction_id = %faction_id, name = %name, kind, "remote rejected duplicate name");
        }
        _ => {
            tracing::error!(faction_id = %faction_id, name = %name, kind, error = %err, "remote create failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
