//! Remote gateway capability surface.
//!
//! The engine only ever talks to the collaboration platform through
//! [`RemoteGateway`]. It never asks the gateway whether something exists;
//! existence is what the mapping store says. The gateway is consulted to turn
//! a known id into a handle, to create and delete objects, and to read the
//! sibling channel names used for disambiguation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

snowflake!(
    /// Remote role identity.
    RoleId
);
snowflake!(
    /// Remote channel identity.
    ChannelId
);
snowflake!(
    /// Remote channel category under which faction channels are created.
    CategoryId
);
snowflake!(
    /// Remote server (guild) identity.
    GuildId
);

/// A resolved remote role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleHandle {
    pub id: RoleId,
    pub name: String,
    /// Platform-managed roles (integrations, boosts) must never be deleted.
    pub managed: bool,
}

/// A resolved remote channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: ChannelId,
    pub name: String,
    pub category: Option<CategoryId>,
}

/// Channel visibility primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityRule {
    /// Hide the channel from everyone by default.
    DenyDefault,
    /// Let members of this role see the channel.
    AllowRole(RoleId),
}

/// Visibility for a faction channel: hidden from everyone but `role`.
pub fn faction_visibility(role: RoleId) -> [VisibilityRule; 2] {
    [VisibilityRule::DenyDefault, VisibilityRule::AllowRole(role)]
}

/// Object lifecycle operations on the collaboration platform.
pub trait RemoteGateway: Send + Sync {
    fn create_role(&self, name: &str) -> Result<RoleHandle, GatewayError>;

    fn delete_role(&self, role: &RoleHandle) -> Result<(), GatewayError>;

    /// `Ok(None)` when the role no longer exists.
    fn get_role(&self, id: RoleId) -> Result<Option<RoleHandle>, GatewayError>;

    fn create_channel(
        &self,
        name: &str,
        category: CategoryId,
        visibility: &[VisibilityRule],
    ) -> Result<ChannelHandle, GatewayError>;

    fn delete_channel(&self, channel: &ChannelHandle) -> Result<(), GatewayError>;

    /// `Ok(None)` when the channel no longer exists.
    fn get_channel(&self, id: ChannelId) -> Result<Option<ChannelHandle>, GatewayError>;

    /// Names of every channel currently under `category`.
    fn list_sibling_channel_names(
        &self,
        category: CategoryId,
    ) -> Result<BTreeSet<String>, GatewayError>;

    /// The name the platform will actually give a channel requested as
    /// `name`. Disambiguation runs on this form so it compares like with
    /// like against sibling names. Defaults to Discord's text-channel rule.
    fn normalize_channel_name(&self, name: &str) -> String {
        text_channel_name(name)
    }
}

/// Discord's text-channel naming: lower-case, whitespace runs become a
/// single `-`, surrounding whitespace is dropped.
pub fn text_channel_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

impl<G: RemoteGateway + ?Sized> RemoteGateway for &G {
    fn create_role(&self, name: &str) -> Result<RoleHandle, GatewayError> {
        (**self).create_role(name)
    }

    fn delete_role(&self, role: &RoleHandle) -> Result<(), GatewayError> {
        (**self).delete_role(role)
    }

    fn get_role(&self, id: RoleId) -> Result<Option<RoleHandle>, GatewayError> {
        (**self).get_role(id)
    }

    fn create_channel(
        &self,
        name: &str,
        category: CategoryId,
        visibility: &[VisibilityRule],
    ) -> Result<ChannelHandle, GatewayError> {
        (**self).create_channel(name, category, visibility)
    }

    fn delete_channel(&self, channel: &ChannelHandle) -> Result<(), GatewayError> {
        (**self).delete_channel(channel)
    }

    fn get_channel(&self, id: ChannelId) -> Result<Option<ChannelHandle>, GatewayError> {
        (**self).get_channel(id)
    }

    fn list_sibling_channel_names(
        &self,
        category: CategoryId,
    ) -> Result<BTreeSet<String>, GatewayError> {
        (**self).list_sibling_channel_names(category)
    }

    fn normalize_channel_name(&self, name: &str) -> String {
        (**self).normalize_channel_name(name)
    }
}
