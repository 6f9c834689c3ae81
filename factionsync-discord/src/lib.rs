//! # factionsync-discord
//!
//! [`RemoteGateway`] over the Discord REST API (v10).
//!
//! The client is blocking; callers on an async runtime run cycles inside
//! `spawn_blocking`. Rate-limit responses surface as
//! [`GatewayError::Http`] with status 429; the sync schedule is the retry.

pub mod wire;

use std::collections::BTreeSet;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use factionsync_sync::{
    CategoryId, ChannelHandle, ChannelId, GatewayError, GuildId, RemoteGateway, RoleHandle,
    RoleId, VisibilityRule,
};

use crate::wire::{create_channel_body, CreateRole, RawChannel, RawRole};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/factionsync/factionsync, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Discord-backed gateway bound to one guild.
pub struct DiscordGateway {
    agent: ureq::Agent,
    api_base: String,
    authorization: String,
    guild: GuildId,
}

impl DiscordGateway {
    pub fn new(token: &str, guild: GuildId) -> Self {
        Self::with_api_base(token, guild, DEFAULT_API_BASE)
    }

    /// Point the client at another API root (e.g. a local mock server).
    pub fn with_api_base(token: &str, guild: GuildId, api_base: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            api_base: api_base.trim_end_matches('/').to_owned(),
            authorization: format!("Bot {token}"),
            guild,
        }
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self
            .agent
            .get(&self.url(path))
            .set("Authorization", &self.authorization)
            .call()
            .map_err(map_error)?;
        decode(response)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, GatewayError> {
        let response = self
            .agent
            .post(&self.url(path))
            .set("Authorization", &self.authorization)
            .send_json(body)
            .map_err(map_error)?;
        decode(response)
    }

    fn delete(&self, path: &str) -> Result<(), GatewayError> {
        self.agent
            .delete(&self.url(path))
            .set("Authorization", &self.authorization)
            .call()
            .map_err(map_error)?;
        Ok(())
    }

    fn guild_channels(&self) -> Result<Vec<RawChannel>, GatewayError> {
        self.get(&format!("/guilds/{}/channels", self.guild))
    }
}

impl RemoteGateway for DiscordGateway {
    fn create_role(&self, name: &str) -> Result<RoleHandle, GatewayError> {
        let raw: RawRole = self.post(
            &format!("/guilds/{}/roles", self.guild),
            &CreateRole { name },
        )?;
        raw.into_handle()
    }

    fn delete_role(&self, role: &RoleHandle) -> Result<(), GatewayError> {
        if role.managed {
            return Err(GatewayError::Protected);
        }
        self.delete(&format!("/guilds/{}/roles/{}", self.guild, role.id))
    }

    fn get_role(&self, id: RoleId) -> Result<Option<RoleHandle>, GatewayError> {
        let roles: Vec<RawRole> = self.get(&format!("/guilds/{}/roles", self.guild))?;
        let wanted = id.0.to_string();
        roles
            .into_iter()
            .find(|r| r.id == wanted)
            .map(RawRole::into_handle)
            .transpose()
    }

    fn create_channel(
        &self,
        name: &str,
        category: CategoryId,
        visibility: &[VisibilityRule],
    ) -> Result<ChannelHandle, GatewayError> {
        let body = create_channel_body(name, self.guild, category, visibility);
        let raw: RawChannel = self.post(&format!("/guilds/{}/channels", self.guild), &body)?;
        raw.into_handle()
    }

    fn delete_channel(&self, channel: &ChannelHandle) -> Result<(), GatewayError> {
        self.delete(&format!("/channels/{}", channel.id))
    }

    fn get_channel(&self, id: ChannelId) -> Result<Option<ChannelHandle>, GatewayError> {
        match self.get::<RawChannel>(&format!("/channels/{id}")) {
            Ok(raw) => raw.into_handle().map(Some),
            Err(GatewayError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn list_sibling_channel_names(
        &self,
        category: CategoryId,
    ) -> Result<BTreeSet<String>, GatewayError> {
        Ok(self
            .guild_channels()?
            .into_iter()
            .filter(|c| c.is_under(category))
            .filter_map(|c| c.name)
            .collect())
    }
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, GatewayError> {
    response
        .into_json::<T>()
        .map_err(|e| GatewayError::Decode(e.to_string()))
}

fn map_error(err: ureq::Error) -> GatewayError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            status_error(status, body)
        }
        ureq::Error::Transport(transport) => GatewayError::Transport(transport.to_string()),
    }
}

fn status_error(status: u16, body: String) -> GatewayError {
    match status {
        404 => GatewayError::NotFound,
        409 => GatewayError::Conflict { name: body },
        _ => {
            tracing::debug!(status, body = %body, "discord request rejected");
            GatewayError::Http { status, body }
        }
    }
}
