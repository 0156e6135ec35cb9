//! Shared state persistence.
//!
//! # Responsibilities
//! - Define the `ChannelStore` and `ConsentStore` contracts
//! - Select a backend from configuration
//! - Fall back to the in-memory backend when initialization fails
//!
//! # Design Decisions
//! - Store methods are infallible by signature: every backend logs a
//!   transport failure and returns the type's safe default (0/None/false),
//!   so a store outage can never block or crash a tick
//! - Backend selection is a pure configuration decision made once at
//!   construction; there is no runtime method lookup

pub mod memory;
pub mod nats;
pub mod sqlite;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{ChannelStorageConfig, ChannelStorageKind, ConsentStorageConfig,
    ConsentStorageKind};

pub use memory::{MemoryChannelStore, MemoryConsentStore};
pub use nats::NatsChannelStore;
pub use sqlite::SqliteConsentStore;

/// Cross-process occupancy counters, affinity and topology mirror.
///
/// Invariants every backend must satisfy: counters never go negative
/// (decrement past zero clamps), absent-key reads return the default,
/// concurrent sets are last-write-wins.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Last group the client was associated with.
    async fn last_group(&self, client: Uuid) -> Option<String>;
    async fn set_last_group(&self, client: Uuid, group: &str);
    async fn clear_last_group(&self, client: Uuid);

    /// Returns the counter value after the increment.
    async fn increment_channel_count(&self, server: &str) -> i64;
    /// Returns the counter value after the decrement, floored at zero.
    async fn decrement_channel_count(&self, server: &str) -> i64;
    async fn channel_count(&self, server: &str) -> i64;

    /// Instance the client currently occupies, as last observed.
    async fn current_channel(&self, client: Uuid) -> Option<String>;
    async fn set_current_channel(&self, client: Uuid, server: &str);
    async fn clear_current_channel(&self, client: Uuid);

    /// Topology mirror, kept in the store so externally-driven
    /// deployments can introspect it without a second channel.
    async fn store_groups(&self, groups: &[String]);
    async fn store_group_servers(&self, group: &str, servers: &[String]);
    async fn store_group_max_players(&self, group: &str, max_players: u32);
}

/// Per-client consent flag, persisted independently of occupancy state.
#[async_trait]
pub trait ConsentStore: Send + Sync {
    async fn has_consent(&self, client: Uuid) -> bool;
    async fn set_consent(&self, client: Uuid, consented: bool);
}

/// Build the consent store selected by configuration.
///
/// A persistent-store initialization failure falls back to the transient
/// in-memory backend rather than failing startup.
pub fn build_consent_store(
    config: &ConsentStorageConfig,
    data_dir: &Path,
) -> Arc<dyn ConsentStore> {
    match config.kind {
        ConsentStorageKind::Memory => Arc::new(MemoryConsentStore::new()),
        ConsentStorageKind::Local => {
            let path = data_dir.join(&config.file);
            match SqliteConsentStore::open(&path) {
                Ok(store) => Arc::new(store),
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        %error,
                        "failed to initialize consent storage, falling back to in-memory store"
                    );
                    Arc::new(MemoryConsentStore::new())
                }
            }
        }
    }
}

/// Build the channel store selected by configuration.
pub async fn build_channel_store(config: &ChannelStorageConfig) -> Arc<dyn ChannelStore> {
    match config.kind {
        ChannelStorageKind::Memory => Arc::new(MemoryChannelStore::new()),
        ChannelStorageKind::Nats => {
            match NatsChannelStore::connect(&config.url, &config.bucket, &config.key_prefix).await
            {
                Ok(store) => Arc::new(store),
                Err(error) => {
                    tracing::warn!(
                        url = %config.url,
                        %error,
                        "failed to initialize channel storage, falling back to in-memory store"
                    );
                    Arc::new(MemoryChannelStore::new())
                }
            }
        }
    }
}
