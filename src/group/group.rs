//! A named group of interchangeable instances.

use crate::host::names_match;
use crate::store::ChannelStore;

/// Immutable once constructed from configuration.
#[derive(Debug, Clone)]
pub struct ChannelGroup {
    name: String,
    servers: Vec<String>,
    max_players: u32,
}

impl ChannelGroup {
    pub fn new(name: impl Into<String>, servers: Vec<String>, max_players: u32) -> Self {
        Self {
            name: name.into(),
            servers,
            max_players,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in declaration order.
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Occupancy ceiling per member. 0 = unbounded.
    pub fn max_players(&self) -> u32 {
        self.max_players
    }

    pub fn contains(&self, server: &str) -> bool {
        self.servers.iter().any(|s| names_match(s, server))
    }

    /// Pick the member with the lowest occupancy counter strictly below the
    /// ceiling, skipping `excluded` only while the group has more than one
    /// member. When every member is full or excluded, falls back to the
    /// first non-excluded member anyway so the holding area always has a
    /// channel to retry. Ties break on declaration order.
    pub async fn select_server(
        &self,
        store: &dyn ChannelStore,
        excluded: Option<&str>,
    ) -> Option<String> {
        if self.servers.is_empty() {
            return None;
        }

        let limit = if self.max_players > 0 {
            i64::from(self.max_players)
        } else {
            i64::MAX
        };

        let mut best: Option<&str> = None;
        let mut best_count = i64::MAX;
        for server in &self.servers {
            if let Some(excluded) = excluded {
                if self.servers.len() > 1 && names_match(server, excluded) {
                    continue;
                }
            }
            let count = store.channel_count(server).await;
            if count >= limit {
                continue;
            }
            if count < best_count {
                best = Some(server);
                best_count = count;
            }
        }

        if let Some(best) = best {
            return Some(best.to_string());
        }

        // All full or excluded: return some member rather than stalling.
        for server in &self.servers {
            match excluded {
                Some(excluded) if names_match(server, excluded) => continue,
                _ => return Some(server.clone()),
            }
        }
        Some(self.servers[0].clone())
    }
}
