//! Discord REST payloads and their mapping onto gateway types.

use serde::{Deserialize, Serialize};

use factionsync_sync::{
    CategoryId, ChannelHandle, ChannelId, GatewayError, GuildId, RoleHandle, RoleId,
    VisibilityRule,
};

/// `VIEW_CHANNEL` permission bit.
pub const VIEW_CHANNEL: u64 = 1 << 10;

/// Guild text channel.
pub const GUILD_TEXT: u8 = 0;

/// Permission overwrite target kind for roles.
const OVERWRITE_ROLE: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRole<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionOverwrite {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub allow: String,
    pub deny: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateChannel<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: u8,
    pub parent_id: String,
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRole {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub managed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Translate visibility rules into overwrites. Deny-by-default targets the
/// `@everyone` role, whose id equals the guild id.
pub fn overwrites(guild: GuildId, rules: &[VisibilityRule]) -> Vec<PermissionOverwrite> {
    rules
        .iter()
        .map(|rule| match rule {
            VisibilityRule::DenyDefault => PermissionOverwrite {
                id: guild.0.to_string(),
                kind: OVERWRITE_ROLE,
                allow: "0".to_string(),
                deny: VIEW_CHANNEL.to_string(),
            },
            VisibilityRule::AllowRole(role) => PermissionOverwrite {
                id: role.0.to_string(),
                kind: OVERWRITE_ROLE,
                allow: VIEW_CHANNEL.to_string(),
                deny: "0".to_string(),
            },
        })
        .collect()
}

pub fn create_channel_body<'a>(
    name: &'a str,
    guild: GuildId,
    category: CategoryId,
    rules: &[VisibilityRule],
) -> CreateChannel<'a> {
    CreateChannel {
        name,
        kind: GUILD_TEXT,
        parent_id: category.0.to_string(),
        permission_overwrites: overwrites(guild, rules),
    }
}

pub fn snowflake(raw: &str) -> Result<u64, GatewayError> {
    raw.parse::<u64>()
        .map_err(|_| GatewayError::Decode(format!("invalid snowflake '{raw}'")))
}

impl RawRole {
    pub fn into_handle(self) -> Result<RoleHandle, GatewayError> {
        Ok(RoleHandle {
            id: RoleId(snowflake(&self.id)?),
            name: self.name,
            managed: self.managed,
        })
    }
}

impl RawChannel {
    pub fn into_handle(self) -> Result<ChannelHandle, GatewayError> {
        let category = self
            .parent_id
            .as_deref()
            .map(snowflake)
            .transpose()?
            .map(CategoryId);
        Ok(ChannelHandle {
            id: ChannelId(snowflake(&self.id)?),
            name: self.name.unwrap_or_default(),
            category,
        })
    }

    pub fn is_under(&self, category: CategoryId) -> bool {
        self.parent_id.as_deref() == Some(category.0.to_string().as_str())
    }
}
