//! Pure reconciliation decisions. Nothing here touches the store or gateway.

use std::collections::BTreeSet;

use serde::Serialize;

use factionsync_core::{FactionEntity, FactionId};

use crate::gateway::{ChannelId, RoleId};
use crate::store::{ChannelRecord, RoleRecord};

/// What to do about a faction's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RolePlan {
    /// A record exists; resolve and reuse it. The remote name is never
    /// updated, even if the tag has changed since.
    Reuse { role_id: RoleId },
    /// No record; create a role named after the tag.
    Create { name: String },
}

/// What to do about a faction's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChannelPlan {
    /// A record exists; channels are never renamed.
    Keep { channel_id: ChannelId, name: String },
    /// No record; create from this base name after disambiguation.
    Create { base_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactionPlan {
    pub faction_id: FactionId,
    pub tag: String,
    pub role: RolePlan,
    pub channel: ChannelPlan,
}

/// Decide role/channel actions for one primary faction from its records.
pub fn plan_faction(
    faction: &FactionEntity,
    role: Option<&RoleRecord>,
    channel: Option<&ChannelRecord>,
) -> FactionPlan {
    let role = match role {
        Some(record) => RolePlan::Reuse {
            role_id: record.role_id,
        },
        None => RolePlan::Create {
            name: faction.tag.clone(),
        },
    };
    let channel = match channel {
        Some(record) => ChannelPlan::Keep {
            channel_id: record.channel_id,
            name: record.resolved_name.clone(),
        },
        None => ChannelPlan::Create {
            base_name: channel_base_name(&faction.display_name),
        },
    };
    FactionPlan {
        faction_id: faction.id,
        tag: faction.tag.clone(),
        role,
        channel,
    }
}

/// Candidate channel name for a faction display name. The gateway's
/// `normalize_channel_name` turns it into the platform form before it is
/// disambiguated.
pub fn channel_base_name(display_name: &str) -> String {
    display_name.to_lowercase()
}

/// First of `base`, `base-2`, `base-3`, … not present in `siblings`.
///
/// An empty base still participates: `""`, then `"-2"`, and so on.
pub fn resolve_channel_name(base: &str, siblings: &BTreeSet<String>) -> String {
    if !siblings.contains(base) {
        return base.to_owned();
    }
    (2u64..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !siblings.contains(candidate))
        .unwrap_or_else(|| base.to_owned())
}
