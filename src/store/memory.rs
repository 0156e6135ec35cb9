//! In-process store backends.
//!
//! Single-deployment defaults; all state is lost on restart.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use crate::store::{ChannelStore, ConsentStore};

/// In-memory `ChannelStore`.
#[derive(Debug, Default)]
pub struct MemoryChannelStore {
    last_groups: DashMap<Uuid, String>,
    channel_counts: DashMap<String, AtomicI64>,
    current_channels: DashMap<Uuid, String>,
    group_servers: DashMap<String, Vec<String>>,
    group_max_players: DashMap<String, u32>,
}

impl MemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelStore for MemoryChannelStore {
    async fn last_group(&self, client: Uuid) -> Option<String> {
        self.last_groups.get(&client).map(|v| v.clone())
    }

    async fn set_last_group(&self, client: Uuid, group: &str) {
        self.last_groups.insert(client, group.to_string());
    }

    async fn clear_last_group(&self, client: Uuid) {
        self.last_groups.remove(&client);
    }

    async fn increment_channel_count(&self, server: &str) -> i64 {
        self.channel_counts
            .entry(server.to_string())
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(1, Ordering::Relaxed)
            + 1
    }

    async fn decrement_channel_count(&self, server: &str) -> i64 {
        let Some(counter) = self.channel_counts.get(server) else {
            return 0;
        };
        let next = counter.fetch_sub(1, Ordering::Relaxed) - 1;
        if next < 0 {
            // Tracking drift: clamp rather than corrupt.
            counter.store(0, Ordering::Relaxed);
            return 0;
        }
        next
    }

    async fn channel_count(&self, server: &str) -> i64 {
        self.channel_counts
            .get(server)
            .map(|c| c.load(Ordering::Relaxed).max(0))
            .unwrap_or(0)
    }

    async fn current_channel(&self, client: Uuid) -> Option<String> {
        self.current_channels.get(&client).map(|v| v.clone())
    }

    async fn set_current_channel(&self, client: Uuid, server: &str) {
        self.current_channels.insert(client, server.to_string());
    }

    async fn clear_current_channel(&self, client: Uuid) {
        self.current_channels.remove(&client);
    }

    async fn store_groups(&self, groups: &[String]) {
        self.group_servers.retain(|name, _| groups.contains(name));
        self.group_max_players
            .retain(|name, _| groups.contains(name));
    }

    async fn store_group_servers(&self, group: &str, servers: &[String]) {
        self.group_servers
            .insert(group.to_string(), servers.to_vec());
    }

    async fn store_group_max_players(&self, group: &str, max_players: u32) {
        self.group_max_players.insert(group.to_string(), max_players);
    }
}

/// In-memory `ConsentStore`.
#[derive(Debug, Default)]
pub struct MemoryConsentStore {
    consented: DashSet<Uuid>,
}

impl MemoryConsentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConsentStore for MemoryConsentStore {
    async fn has_consent(&self, client: Uuid) -> bool {
        self.consented.contains(&client)
    }

    async fn set_consent(&self, client: Uuid, consented: bool) {
        if consented {
            self.consented.insert(client);
        } else {
            self.consented.remove(&client);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_count_never_goes_negative() {
        let store = MemoryChannelStore::new();
        assert_eq!(store.decrement_channel_count("alpha").await, 0);
        store.increment_channel_count("alpha").await;
        assert_eq!(store.decrement_channel_count("alpha").await, 0);
        for _ in 0..5 {
            assert_eq!(store.decrement_channel_count("alpha").await, 0);
        }
        assert_eq!(store.channel_count("alpha").await, 0);
        assert_eq!(store.increment_channel_count("alpha").await, 1);
    }

    #[tokio::test]
    async fn last_group_round_trip() {
        let store = MemoryChannelStore::new();
        let client = Uuid::new_v4();
        assert_eq!(store.last_group(client).await, None);
        store.set_last_group(client, "main").await;
        assert_eq!(store.last_group(client).await.as_deref(), Some("main"));
        store.clear_last_group(client).await;
        assert_eq!(store.last_group(client).await, None);
    }

    #[tokio::test]
    async fn current_channel_round_trip() {
        let store = MemoryChannelStore::new();
        let client = Uuid::new_v4();
        store.set_current_channel(client, "alpha").await;
        assert_eq!(
            store.current_channel(client).await.as_deref(),
            Some("alpha")
        );
        store.clear_current_channel(client).await;
        assert_eq!(store.current_channel(client).await, None);
    }

    #[tokio::test]
    async fn consent_set_and_revoke() {
        let store = MemoryConsentStore::new();
        let client = Uuid::new_v4();
        assert!(!store.has_consent(client).await);
        store.set_consent(client, true).await;
        assert!(store.has_consent(client).await);
        store.set_consent(client, true).await;
        assert!(store.has_consent(client).await);
        store.set_consent(client, false).await;
        assert!(!store.has_consent(client).await);
    }

    #[tokio::test]
    async fn topology_mirror_drops_stale_groups() {
        let store = MemoryChannelStore::new();
        store
            .store_group_servers("old", &["a".to_string()])
            .await;
        store.store_group_max_players("old", 10).await;
        store.store_groups(&["new".to_string()]).await;
        assert!(store.group_servers.get("old").is_none());
        assert!(store.group_max_players.get("old").is_none());
    }
}
