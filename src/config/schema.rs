//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the router.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Name of the always-available holding instance.
    pub limbo_server: String,

    /// Instance clients are sent to when no better target is known.
    pub direct_connect_server: Option<String>,

    /// Group consulted when a client has no recorded affinity.
    pub default_group: String,

    /// Whether per-instance FIFO queues are maintained.
    pub queue_enabled: bool,

    /// Reconnection tick interval in milliseconds.
    pub task_interval_ms: u64,

    /// Notification tick interval in seconds.
    pub queue_notify_interval_secs: u64,

    /// Named instance groups. BTreeMap keeps iteration order stable.
    pub groups: BTreeMap<String, GroupConfig>,

    /// Privacy-consent gating.
    pub consent: ConsentConfig,

    /// Occupancy/affinity store backend selection.
    pub channel_storage: ChannelStorageConfig,
}

/// One named group of interchangeable instances.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GroupConfig {
    /// Member instance names, in declaration order.
    pub servers: Vec<String>,

    /// Occupancy ceiling per member instance. 0 = unbounded.
    pub max_players: u32,
}

/// Consent gating configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// Whether consent is required before queueing/routing.
    pub enabled: bool,

    /// Minimum seconds between consent prompts per client.
    pub prompt_cooldown_secs: u64,

    /// Consent persistence backend.
    pub storage: ConsentStorageConfig,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prompt_cooldown_secs: 5,
            storage: ConsentStorageConfig::default(),
        }
    }
}

/// Consent storage backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsentStorageConfig {
    pub kind: ConsentStorageKind,

    /// Database file name, resolved against the data directory.
    pub file: String,
}

impl Default for ConsentStorageConfig {
    fn default() -> Self {
        Self {
            kind: ConsentStorageKind::Local,
            file: "consent.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStorageKind {
    /// In-process only; lost on restart.
    Memory,
    /// File-backed sqlite database.
    Local,
}

/// Channel/occupancy storage backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelStorageConfig {
    pub kind: ChannelStorageKind,

    /// Key prefix for shared backends, so deployments can coexist.
    pub key_prefix: String,

    /// NATS server URL for the distributed backend.
    pub url: String,

    /// JetStream KV bucket for the distributed backend.
    pub bucket: String,
}

impl Default for ChannelStorageConfig {
    fn default() -> Self {
        Self {
            kind: ChannelStorageKind::Memory,
            key_prefix: "vlh".to_string(),
            url: "nats://127.0.0.1:4222".to_string(),
            bucket: "limbo-router".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStorageKind {
    /// In-process only; single-deployment.
    Memory,
    /// Shared key-value store for multi-process deployments.
    Nats,
}

impl RouterConfig {
    /// Reasonable defaults for everything except the topology, which has
    /// no meaningful default.
    pub fn example() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(
            "main".to_string(),
            GroupConfig {
                servers: vec!["alpha".to_string(), "beta".to_string()],
                max_players: 0,
            },
        );
        Self {
            limbo_server: "limbo".to_string(),
            groups,
            ..Self::default()
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            limbo_server: String::new(),
            direct_connect_server: None,
            default_group: "main".to_string(),
            queue_enabled: true,
            task_interval_ms: 3000,
            queue_notify_interval_secs: 5,
            groups: BTreeMap::new(),
            consent: ConsentConfig::default(),
            channel_storage: ChannelStorageConfig::default(),
        }
    }
}
