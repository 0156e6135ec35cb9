//! Host runtime interfaces.
//!
//! # Responsibilities
//! - Define the seams between the routing engine and the host proxy
//! - Carry client identity, liveness and permission checks
//! - Expose instance lookup, reachability probes and connect requests
//!
//! # Design Decisions
//! - Everything the engine needs from the host is an injected trait object;
//!   the engine holds no global state and performs no runtime lookup
//! - Absent maintenance integration means "never in maintenance"
//! - User-facing output is a structured `Notice`; rendering is host-side

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use uuid::Uuid;

/// A client parked in (or moving through) the holding area.
///
/// The engine never owns clients; it holds handles supplied by the host
/// event feed and re-checks `is_active` before every probe or connect.
pub trait Client: Send + Sync {
    /// Stable identity, unique across sessions.
    fn id(&self) -> Uuid;

    /// Display name, used only for logging.
    fn name(&self) -> &str;

    /// Whether the client is still connected to the proxy at all.
    fn is_active(&self) -> bool;

    /// Host-side permission check (maintenance bypass nodes etc).
    fn has_permission(&self, node: &str) -> bool;

    /// The instance the client currently occupies, if any.
    fn current_server(&self) -> Option<String>;

    /// Deliver a structured notice to the client.
    fn send_notice(&self, notice: Notice);
}

/// Shared client handle.
pub type ClientRef = Arc<dyn Client>;

/// Structured, host-rendered messages emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Sent once when a client is admitted into the holding area.
    Welcome,
    /// Sent when the client first lands in an instance queue.
    QueueJoined { position: i64 },
    /// Periodic queue standing while waiting.
    QueuePosition { position: i64 },
    /// The target rejected the client as banned.
    Banned,
    /// The target rejected the client as not allow-listed.
    NotWhitelisted,
    /// The target is under maintenance and the client holds no bypass.
    Maintenance,
    /// A connect attempt was rejected for an unclassified reason.
    ConnectFailed { reason: String },
    /// Consent has not been given yet.
    ConsentPrompt,
    /// Consent was just recorded.
    ConsentAccepted,
    /// Consent was already on record.
    ConsentAlreadyAccepted,
}

/// Player counts self-reported by an instance in a ping response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerCounts {
    pub online: u32,
    pub max: u32,
}

/// Outcome of a reachability probe.
///
/// `players: None` means the instance answered but did not report counts;
/// the cascade treats that the same as an unusable candidate.
#[derive(Debug, Clone, Copy)]
pub struct PingStatus {
    pub players: Option<PlayerCounts>,
}

/// Probe failure. Any failure advances the cascade; variants exist only
/// so the host can be precise in logs.
#[derive(Debug, thiserror::Error)]
pub enum PingError {
    #[error("instance unreachable: {0}")]
    Unreachable(String),
    #[error("probe timed out")]
    Timeout,
}

/// Instance directory supplied by the host.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Whether an instance with this name is registered.
    fn has_server(&self, name: &str) -> bool;

    /// All registered instance names.
    fn server_names(&self) -> Vec<String>;

    /// Clients currently connected to the named instance.
    fn clients_on(&self, name: &str) -> Vec<ClientRef>;

    /// Every client connected to the proxy, wherever it sits.
    fn all_clients(&self) -> Vec<ClientRef>;

    /// Single-shot async reachability probe.
    async fn ping(&self, name: &str) -> Result<PingStatus, PingError>;
}

/// Result of an issued connect request.
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    /// The client arrived at the target.
    Connected,
    /// Another path is already moving this client; benign no-op.
    AlreadyInProgress,
    /// The target refused the client. The reason text combines the
    /// transport error and any structured rejection the host surfaced.
    Refused { reason: String },
}

/// Connect API supplied by the host.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, client: &ClientRef, server: &str) -> ConnectOutcome;
}

/// Maintenance-status lookup, injected at construction.
pub trait MaintenanceStatus: Send + Sync {
    /// Whether the named instance is flagged under maintenance.
    fn is_under_maintenance(&self, server: &str) -> bool;

    /// Whether the client is on an external maintenance allow-list.
    fn is_allow_listed(&self, client: &ClientRef) -> bool;
}

/// Default when no maintenance integration is present.
pub struct NoMaintenance;

impl MaintenanceStatus for NoMaintenance {
    fn is_under_maintenance(&self, _server: &str) -> bool {
        false
    }

    fn is_allow_listed(&self, _client: &ClientRef) -> bool {
        false
    }
}

/// External hold on reconnection, e.g. while a client authenticates.
/// Blocked clients are neither admitted nor cascaded.
pub trait ReconnectBlocker: Send + Sync {
    fn block(&self, client: Uuid);
    fn unblock(&self, client: Uuid);
    fn is_blocked(&self, client: Uuid) -> bool;
}

/// In-process blocker backed by a concurrent set.
#[derive(Default)]
pub struct MemoryReconnectBlocker {
    blocked: DashSet<Uuid>,
}

impl MemoryReconnectBlocker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReconnectBlocker for MemoryReconnectBlocker {
    fn block(&self, client: Uuid) {
        self.blocked.insert(client);
    }

    fn unblock(&self, client: Uuid) {
        self.blocked.remove(&client);
    }

    fn is_blocked(&self, client: Uuid) -> bool {
        self.blocked.contains(&client)
    }
}

impl fmt::Debug for MemoryReconnectBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryReconnectBlocker")
            .field("blocked", &self.blocked.len())
            .finish()
    }
}

/// Case-insensitive instance-name comparison. Host directories commonly
/// treat names as case-preserving but case-insensitive.
pub fn names_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Whether a client may enter an instance that is under maintenance.
/// Admin and global bypass nodes, a per-instance bypass node, or external
/// allow-list membership all qualify.
pub fn has_maintenance_bypass(
    client: &ClientRef,
    server: &str,
    maintenance: &dyn MaintenanceStatus,
) -> bool {
    client.has_permission("maintenance.admin")
        || client.has_permission("maintenance.bypass")
        || client.has_permission(&format!("maintenance.singleserver.bypass.{server}"))
        || maintenance.is_allow_listed(client)
}
