//! Per-client admission state.
//!
//! # Design Decisions
//! - All maps are concurrent; scheduled ticks and event callbacks mutate
//!   them without a global lock
//! - The connecting flag is a guard, not a lock: an atomic test-and-set
//!   prevents a second cascade for a client that already has one in flight
//! - Queue membership is unique per queue; FIFO order is preserved

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use crate::consent::ConsentManager;
use crate::group::GroupRegistry;
use crate::host::{
    has_maintenance_bypass, ClientRef, Directory, MaintenanceStatus, Notice, ReconnectBlocker,
};
use crate::routing::RoutingDefaults;

struct AdmissionRecord {
    client: ClientRef,
    fallback_server: String,
}

pub struct AdmissionTracker {
    defaults: Arc<RoutingDefaults>,
    registry: Arc<GroupRegistry>,
    directory: Arc<dyn Directory>,
    consent: Option<Arc<ConsentManager>>,
    blocker: Arc<dyn ReconnectBlocker>,

    records: DashMap<Uuid, AdmissionRecord>,
    connecting: DashSet<Uuid>,
    // Keyed by lowercased instance name.
    queues: DashMap<String, VecDeque<ClientRef>>,
    issues: DashMap<Uuid, String>,
    intended_servers: DashMap<Uuid, String>,
}

impl AdmissionTracker {
    pub fn new(
        defaults: Arc<RoutingDefaults>,
        registry: Arc<GroupRegistry>,
        directory: Arc<dyn Directory>,
        consent: Option<Arc<ConsentManager>>,
        blocker: Arc<dyn ReconnectBlocker>,
    ) -> Self {
        Self {
            defaults,
            registry,
            directory,
            consent,
            blocker,
            records: DashMap::new(),
            connecting: DashSet::new(),
            queues: DashMap::new(),
            issues: DashMap::new(),
            intended_servers: DashMap::new(),
        }
    }

    fn queue_key(server: &str) -> String {
        server.to_ascii_lowercase()
    }

    async fn is_consent_satisfied(&self, client: &ClientRef) -> bool {
        match &self.consent {
            Some(consent) => consent.has_consent(client).await,
            None => true,
        }
    }

    /// Admit a client into the holding area. Idempotent: a second call for
    /// an already-registered client changes nothing.
    ///
    /// The fallback target resolves through a priority chain: the given
    /// instance, then the direct-connect default, then the holding
    /// instance itself.
    pub async fn add_client(&self, client: &ClientRef, fallback: Option<&str>) {
        if self.records.contains_key(&client.id()) {
            return;
        }
        if self.blocker.is_blocked(client.id()) {
            return;
        }

        let fallback_server = fallback
            .filter(|name| self.directory.has_server(name))
            .map(ToString::to_string)
            .or_else(|| self.defaults.direct_connect_server.clone())
            .unwrap_or_else(|| self.defaults.limbo_server.clone());

        self.records.insert(
            client.id(),
            AdmissionRecord {
                client: client.clone(),
                fallback_server: fallback_server.clone(),
            },
        );

        client.send_notice(Notice::Welcome);

        if self.defaults.queue_enabled && self.is_consent_satisfied(client).await {
            if let Some(position) = self.push_queue(&fallback_server, client) {
                client.send_notice(Notice::QueueJoined { position });
            }
        }
    }

    /// Re-derive the client's target from stored state and enqueue it.
    /// No-op when queueing is disabled, consent is outstanding, or the
    /// client is already queued.
    pub async fn enqueue_client(&self, client: &ClientRef) {
        if !self.defaults.queue_enabled {
            return;
        }
        if !self.is_consent_satisfied(client).await {
            return;
        }

        let server = self.previous_server(client.id());
        if let Some(position) = self.push_queue(&server, client) {
            client.send_notice(Notice::QueueJoined { position });
        }
    }

    /// Push onto a queue unless already present; returns the 1-based
    /// position of a fresh insert.
    fn push_queue(&self, server: &str, client: &ClientRef) -> Option<i64> {
        let mut queue = self.queues.entry(Self::queue_key(server)).or_default();
        if queue.iter().any(|c| c.id() == client.id()) {
            return None;
        }
        queue.push_back(client.clone());
        Some(queue.len() as i64)
    }

    /// Remove every trace of the client from the holding area and release
    /// any external reconnect block.
    pub fn remove_client(&self, client: Uuid) {
        self.remove_from_queue(client);
        self.records.remove(&client);
        self.connecting.remove(&client);
        self.intended_servers.remove(&client);
        self.blocker.unblock(client);
    }

    /// One-shot override remembering where a client originally tried to
    /// go before being diverted to the holding area. Set-once, read-once.
    pub fn set_intended_server(&self, client: Uuid, server: &str) {
        self.intended_servers.insert(client, server.to_string());
    }

    pub fn consume_intended_server(&self, client: Uuid) -> Option<String> {
        self.intended_servers
            .remove(&client)
            .map(|(_, name)| name)
            .filter(|name| self.directory.has_server(name))
    }

    /// The instance the client should reconnect to. Resolution priority:
    /// explicit fallback record, first instance of the default group, the
    /// direct-connect default, the holding instance itself.
    pub fn previous_server(&self, client: Uuid) -> String {
        if let Some(record) = self.records.get(&client) {
            if self.directory.has_server(&record.fallback_server) {
                return record.fallback_server.clone();
            }
            if let Some(direct) = &self.defaults.direct_connect_server {
                return direct.clone();
            }
        }

        if let Some(group) = self.registry.group(&self.defaults.default_group) {
            if let Some(first) = group.servers().first() {
                if self.directory.has_server(first) {
                    return first.clone();
                }
            }
        }

        if let Some(direct) = &self.defaults.direct_connect_server {
            return direct.clone();
        }
        self.defaults.limbo_server.clone()
    }

    pub fn is_registered(&self, client: Uuid) -> bool {
        self.records.contains_key(&client)
    }

    /// Drop the client from the queue derived from its admission record
    /// (or from the direct-connect queue when no record exists).
    pub fn remove_from_queue(&self, client: Uuid) {
        let server = self
            .records
            .get(&client)
            .map(|record| record.fallback_server.clone())
            .or_else(|| self.defaults.direct_connect_server.clone());

        let Some(server) = server else { return };
        if let Some(mut queue) = self.queues.get_mut(&Self::queue_key(&server)) {
            queue.retain(|c| c.id() != client);
        }
    }

    /// Head of the FIFO for an instance, without dequeuing. The entry is
    /// only removed once the client actually leaves the holding area.
    pub fn next_queued(&self, server: &str) -> Option<ClientRef> {
        self.queues
            .get(&Self::queue_key(server))
            .and_then(|queue| queue.front().cloned())
    }

    pub fn has_queued_clients(&self, server: &str) -> bool {
        self.queues
            .get(&Self::queue_key(server))
            .map(|queue| !queue.is_empty())
            .unwrap_or(false)
    }

    /// 1-based position in the target's queue, or -1 if not queued.
    pub fn queue_position(&self, client: Uuid) -> i64 {
        let server = self.previous_server(client);
        let Some(queue) = self.queues.get(&Self::queue_key(&server)) else {
            return -1;
        };
        queue
            .iter()
            .position(|c| c.id() == client)
            .map(|index| index as i64 + 1)
            .unwrap_or(-1)
    }

    /// First queued client holding a maintenance bypass for the instance.
    pub fn first_maintenance_allowed(
        &self,
        server: &str,
        maintenance: &dyn MaintenanceStatus,
    ) -> Option<ClientRef> {
        let queue = self.queues.get(&Self::queue_key(server))?;
        queue
            .iter()
            .find(|client| has_maintenance_bypass(client, server, maintenance))
            .cloned()
    }

    pub fn set_issue(&self, client: Uuid, issue: &str) {
        self.issues.insert(client, issue.to_string());
    }

    pub fn has_issue(&self, client: Uuid) -> bool {
        self.issues.contains_key(&client)
    }

    pub fn issue(&self, client: Uuid) -> Option<String> {
        self.issues.get(&client).map(|v| v.clone())
    }

    pub fn clear_issue(&self, client: Uuid) {
        self.issues.remove(&client);
    }

    /// Drop dead clients from every queue and from the admission records.
    /// Runs once per reconnection tick before any selection work.
    pub fn prune_inactive(&self) {
        for mut queue in self.queues.iter_mut() {
            queue.retain(|client| client.is_active());
        }
        self.records.retain(|_, record| record.client.is_active());
    }

    pub fn is_connecting(&self, client: Uuid) -> bool {
        self.connecting.contains(&client)
    }

    /// Atomic test-and-set of the connecting guard. Returns false when a
    /// cascade is already in flight for this client.
    pub fn begin_connecting(&self, client: Uuid) -> bool {
        self.connecting.insert(client)
    }

    pub fn end_connecting(&self, client: Uuid) {
        self.connecting.remove(&client);
    }
}
