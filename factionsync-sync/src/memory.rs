//! In-memory [`RemoteGateway`] for tests and offline dry runs.
//!
//! Every call is journaled so callers can assert exactly which remote
//! operations a cycle or teardown performed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::GatewayError;
use crate::gateway::{
    CategoryId, ChannelHandle, ChannelId, RemoteGateway, RoleHandle, RoleId, VisibilityRule,
};

/// One journaled gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    CreateRole { name: String },
    DeleteRole { id: RoleId },
    GetRole { id: RoleId },
    CreateChannel { name: String, category: CategoryId },
    DeleteChannel { id: ChannelId },
    GetChannel { id: ChannelId },
    ListSiblings { category: CategoryId },
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    roles: BTreeMap<RoleId, RoleHandle>,
    channels: BTreeMap<ChannelId, ChannelHandle>,
    visibility: BTreeMap<ChannelId, Vec<VisibilityRule>>,
    rejected_role_names: BTreeSet<String>,
    rejected_channel_names: BTreeSet<String>,
    created: Vec<u64>,
    calls: Vec<GatewayCall>,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Thread-safe fake platform holding roles and channels in maps. Created
/// channels get the normalized name, as Discord would assign it.
#[derive(Debug)]
pub struct InMemoryGateway {
    state: Mutex<State>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1_000,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- seeding ------------------------------------------------------------

    /// Add a role that exists independently of the engine.
    pub fn seed_role(&self, name: &str, managed: bool) -> RoleId {
        let mut state = self.lock();
        let id = RoleId(state.allocate());
        state.roles.insert(
            id,
            RoleHandle {
                id,
                name: name.to_owned(),
                managed,
            },
        );
        id
    }

    /// Add a channel that exists independently of the engine.
    pub fn seed_channel(&self, name: &str, category: CategoryId) -> ChannelId {
        let mut state = self.lock();
        let id = ChannelId(state.allocate());
        state.channels.insert(
            id,
            ChannelHandle {
                id,
                name: name.to_owned(),
                category: Some(category),
            },
        );
        id
    }

    /// Make `create_role(name)` fail with [`GatewayError::Conflict`].
    pub fn reject_role_name(&self, name: &str) {
        self.lock().rejected_role_names.insert(name.to_owned());
    }

    /// Make `create_channel(name, ..)` fail with an HTTP 400.
    pub fn reject_channel_name(&self, name: &str) {
        self.lock().rejected_channel_names.insert(name.to_owned());
    }

    /// Undo [`reject_channel_name`](Self::reject_channel_name).
    pub fn accept_channel_name(&self, name: &str) {
        self.lock().rejected_channel_names.remove(name);
    }

    /// Simulate an out-of-band role deletion.
    pub fn remove_role(&self, id: RoleId) {
        self.lock().roles.remove(&id);
    }

    /// Simulate an out-of-band channel deletion.
    pub fn remove_channel(&self, id: ChannelId) {
        let mut state = self.lock();
        state.channels.remove(&id);
        state.visibility.remove(&id);
    }

    // -- inspection ---------------------------------------------------------

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Ids of every object created through the gateway, in creation order.
    pub fn created_objects(&self) -> Vec<u64> {
        self.lock().created.clone()
    }

    pub fn role(&self, id: RoleId) -> Option<RoleHandle> {
        self.lock().roles.get(&id).cloned()
    }

    pub fn channel(&self, id: ChannelId) -> Option<ChannelHandle> {
        self.lock().channels.get(&id).cloned()
    }

    pub fn channel_visibility(&self, id: ChannelId) -> Option<Vec<VisibilityRule>> {
        self.lock().visibility.get(&id).cloned()
    }

    pub fn role_count(&self) -> usize {
        self.lock().roles.len()
    }

    pub fn channel_count(&self) -> usize {
        self.lock().channels.len()
    }
}

impl RemoteGateway for InMemoryGateway {
    fn create_role(&self, name: &str) -> Result<RoleHandle, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::CreateRole {
            name: name.to_owned(),
        });
        if state.rejected_role_names.contains(name) {
            return Err(GatewayError::Conflict {
                name: name.to_owned(),
            });
        }
        let id = RoleId(state.allocate());
        let handle = RoleHandle {
            id,
            name: name.to_owned(),
            managed: false,
        };
        state.roles.insert(id, handle.clone());
        state.created.push(id.0);
        Ok(handle)
    }

    fn delete_role(&self, role: &RoleHandle) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::DeleteRole { id: role.id });
        let managed = state.roles.get(&role.id).map(|r| r.managed);
        match managed {
            None => Err(GatewayError::NotFound),
            Some(true) => Err(GatewayError::Protected),
            Some(false) => {
                state.roles.remove(&role.id);
                Ok(())
            }
        }
    }

    fn get_role(&self, id: RoleId) -> Result<Option<RoleHandle>, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::GetRole { id });
        Ok(state.roles.get(&id).cloned())
    }

    fn create_channel(
        &self,
        name: &str,
        category: CategoryId,
        visibility: &[VisibilityRule],
    ) -> Result<ChannelHandle, GatewayError> {
        let assigned = self.normalize_channel_name(name);
        let mut state = self.lock();
        state.calls.push(GatewayCall::CreateChannel {
            name: name.to_owned(),
            category,
        });
        if state.rejected_channel_names.contains(name) {
            return Err(GatewayError::Http {
                status: 400,
                body: format!("channel name '{name}' rejected"),
            });
        }
        let id = ChannelId(state.allocate());
        let handle = ChannelHandle {
            id,
            name: assigned,
            category: Some(category),
        };
        state.channels.insert(id, handle.clone());
        state.visibility.insert(id, visibility.to_vec());
        state.created.push(id.0);
        Ok(handle)
    }

    fn delete_channel(&self, channel: &ChannelHandle) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::DeleteChannel { id: channel.id });
        if state.channels.remove(&channel.id).is_none() {
            return Err(GatewayError::NotFound);
        }
        state.visibility.remove(&channel.id);
        Ok(())
    }

    fn get_channel(&self, id: ChannelId) -> Result<Option<ChannelHandle>, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::GetChannel { id });
        Ok(state.channels.get(&id).cloned())
    }

    fn list_sibling_channel_names(
        &self,
        category: CategoryId,
    ) -> Result<BTreeSet<String>, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::ListSiblings { category });
        Ok(state
            .channels
            .values()
            .filter(|c| c.category == Some(category))
            .map(|c| c.name.clone())
            .collect())
    }
}
