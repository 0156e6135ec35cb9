//! Group lookup built once from configuration.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Empty groups are dropped with a warning, never fatal
//! - Instance names are indexed case-insensitively

use std::collections::HashMap;

use crate::config::RouterConfig;
use crate::group::ChannelGroup;
use crate::store::ChannelStore;

/// Bidirectional index: group name -> group, instance name -> group name.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: HashMap<String, ChannelGroup>,
    server_to_group: HashMap<String, String>,
}

impl GroupRegistry {
    /// Build the registry from configuration.
    pub fn from_config(config: &RouterConfig) -> Self {
        let mut groups = HashMap::new();
        let mut server_to_group = HashMap::new();

        for (name, group_config) in &config.groups {
            if group_config.servers.is_empty() {
                tracing::warn!(group = %name, "group has no servers configured, dropping");
                continue;
            }

            for server in &group_config.servers {
                server_to_group.insert(server.to_ascii_lowercase(), name.clone());
            }
            groups.insert(
                name.clone(),
                ChannelGroup::new(
                    name.clone(),
                    group_config.servers.clone(),
                    group_config.max_players,
                ),
            );
        }

        Self {
            groups,
            server_to_group,
        }
    }

    pub fn group(&self, name: &str) -> Option<&ChannelGroup> {
        self.groups.get(name)
    }

    /// The group owning an instance. Ungrouped instances behave as size-1
    /// implicit groups and resolve to `None` here.
    pub fn group_for_server(&self, server: &str) -> Option<&ChannelGroup> {
        self.server_to_group
            .get(&server.to_ascii_lowercase())
            .and_then(|name| self.groups.get(name))
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    pub fn groups(&self) -> impl Iterator<Item = &ChannelGroup> {
        self.groups.values()
    }

    /// Select a member of the named group, see `ChannelGroup::select_server`.
    pub async fn select_server_for_group(
        &self,
        group: &str,
        store: &dyn ChannelStore,
        excluded: Option<&str>,
    ) -> Option<String> {
        match self.groups.get(group) {
            Some(group) => group.select_server(store, excluded).await,
            None => None,
        }
    }
}
