//! Distributed channel storage over NATS JetStream KV.
//!
//! # Responsibilities
//! - Share occupancy counters, affinity and the topology mirror between
//!   router processes through a single KV bucket
//!
//! # Design Decisions
//! - Counters use a compare-and-swap loop on the entry revision; there are
//!   no multi-key transactions, every operation is one idempotent request
//! - Any transport failure logs a warning and degrades to the default
//!   rather than surfacing to the caller

use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::store::ChannelStore;

const CAS_ATTEMPTS: usize = 8;

/// Error raised only while connecting; runtime failures never propagate.
#[derive(Debug, thiserror::Error)]
pub enum NatsError {
    #[error("failed to connect to NATS: {0}")]
    Connect(#[from] async_nats::ConnectError),
    #[error("failed to open KV bucket: {0}")]
    Bucket(#[from] jetstream::context::CreateKeyValueError),
}

/// `ChannelStore` backed by a shared NATS JetStream KV bucket.
pub struct NatsChannelStore {
    kv: kv::Store,
    key_prefix: String,
}

impl NatsChannelStore {
    /// Connect to `url` and open (creating if needed) `bucket`.
    pub async fn connect(url: &str, bucket: &str, key_prefix: &str) -> Result<Self, NatsError> {
        let client = async_nats::connect(url).await?;
        let jetstream = jetstream::new(client);
        let kv = jetstream
            .create_key_value(kv::Config {
                bucket: bucket.to_string(),
                history: 1,
                ..Default::default()
            })
            .await?;

        tracing::info!(%url, %bucket, "connected distributed channel store");

        Ok(Self {
            kv,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn key(&self, raw: &str) -> String {
        let raw: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '=' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if self.key_prefix.is_empty() {
            raw
        } else {
            format!("{}.{}", self.key_prefix, raw)
        }
    }

    async fn get_string(&self, key: &str) -> Option<String> {
        match self.kv.get(key).await {
            Ok(Some(bytes)) => String::from_utf8(bytes.to_vec()).ok(),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(%key, %error, "KV get failed");
                None
            }
        }
    }

    async fn put_string(&self, key: &str, value: &str) {
        if let Err(error) = self.kv.put(key, Bytes::from(value.to_string())).await {
            tracing::warn!(%key, %error, "KV put failed");
        }
    }

    async fn delete_key(&self, key: &str) {
        if let Err(error) = self.kv.purge(key).await {
            tracing::warn!(%key, %error, "KV purge failed");
        }
    }

    /// Atomic add with floor at zero, via revision CAS.
    async fn add_clamped(&self, key: &str, delta: i64) -> i64 {
        for _ in 0..CAS_ATTEMPTS {
            match self.kv.entry(key).await {
                Ok(Some(entry)) => {
                    let current = std::str::from_utf8(&entry.value)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok())
                        .unwrap_or(0);
                    let next = (current + delta).max(0);
                    let payload = Bytes::from(next.to_string());
                    match self.kv.update(key, payload, entry.revision).await {
                        Ok(_) => return next,
                        // Revision raced with another writer; retry.
                        Err(_) => continue,
                    }
                }
                Ok(None) => {
                    let next = delta.max(0);
                    let payload = Bytes::from(next.to_string());
                    match self.kv.create(key, payload).await {
                        Ok(_) => return next,
                        Err(_) => continue,
                    }
                }
                Err(error) => {
                    tracing::warn!(%key, %error, "KV counter read failed");
                    return 0;
                }
            }
        }
        tracing::warn!(%key, "KV counter CAS exhausted retries");
        0
    }
}

#[async_trait]
impl ChannelStore for NatsChannelStore {
    async fn last_group(&self, client: Uuid) -> Option<String> {
        self.get_string(&self.key(&format!("player.last-group.{client}")))
            .await
    }

    async fn set_last_group(&self, client: Uuid, group: &str) {
        self.put_string(&self.key(&format!("player.last-group.{client}")), group)
            .await;
    }

    async fn clear_last_group(&self, client: Uuid) {
        self.delete_key(&self.key(&format!("player.last-group.{client}")))
            .await;
    }

    async fn increment_channel_count(&self, server: &str) -> i64 {
        self.add_clamped(&self.key(&format!("channel.count.{server}")), 1)
            .await
    }

    async fn decrement_channel_count(&self, server: &str) -> i64 {
        self.add_clamped(&self.key(&format!("channel.count.{server}")), -1)
            .await
    }

    async fn channel_count(&self, server: &str) -> i64 {
        self.get_string(&self.key(&format!("channel.count.{server}")))
            .await
            .and_then(|s| s.parse::<i64>().ok())
            .map(|n| n.max(0))
            .unwrap_or(0)
    }

    async fn current_channel(&self, client: Uuid) -> Option<String> {
        self.get_string(&self.key(&format!("player.current-channel.{client}")))
            .await
    }

    async fn set_current_channel(&self, client: Uuid, server: &str) {
        self.put_string(
            &self.key(&format!("player.current-channel.{client}")),
            server,
        )
        .await;
    }

    async fn clear_current_channel(&self, client: Uuid) {
        self.delete_key(&self.key(&format!("player.current-channel.{client}")))
            .await;
    }

    async fn store_groups(&self, groups: &[String]) {
        match serde_json::to_string(groups) {
            Ok(json) => self.put_string(&self.key("groups"), &json).await,
            Err(error) => tracing::warn!(%error, "failed to encode group list"),
        }
    }

    async fn store_group_servers(&self, group: &str, servers: &[String]) {
        match serde_json::to_string(servers) {
            Ok(json) => {
                self.put_string(&self.key(&format!("group.{group}.servers")), &json)
                    .await;
            }
            Err(error) => tracing::warn!(%group, %error, "failed to encode group servers"),
        }
    }

    async fn store_group_max_players(&self, group: &str, max_players: u32) {
        self.put_string(
            &self.key(&format!("group.{group}.max-players")),
            &max_players.to_string(),
        )
        .await;
    }
}
