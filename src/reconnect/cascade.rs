//! Cascading candidate resolution and connect.
//!
//! # Design Decisions
//! - The cascade is an iterative loop carrying its candidate index, not a
//!   recursive callback chain; candidate lists of any length cost no stack
//! - Retry happens only across unreachable/full/maintenance-skipped
//!   candidates; once a connect request has actually been issued and
//!   rejected, the cascade is terminal
//! - Liveness is re-checked before every probe and before issuing the
//!   connect; a dead client aborts the cascade without advancing

use std::sync::Arc;

use crate::admission::AdmissionTracker;
use crate::consent::ConsentManager;
use crate::group::GroupRegistry;
use crate::host::{
    has_maintenance_bypass, names_match, ClientRef, ConnectOutcome, Connector, Directory,
    MaintenanceStatus, Notice, ReconnectBlocker,
};
use crate::routing::RoutingDefaults;
use crate::store::ChannelStore;

pub struct Reconnector {
    defaults: Arc<RoutingDefaults>,
    registry: Arc<GroupRegistry>,
    channel_store: Arc<dyn ChannelStore>,
    tracker: Arc<AdmissionTracker>,
    directory: Arc<dyn Directory>,
    connector: Arc<dyn Connector>,
    maintenance: Arc<dyn MaintenanceStatus>,
    consent: Option<Arc<ConsentManager>>,
    blocker: Arc<dyn ReconnectBlocker>,
}

impl Reconnector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        defaults: Arc<RoutingDefaults>,
        registry: Arc<GroupRegistry>,
        channel_store: Arc<dyn ChannelStore>,
        tracker: Arc<AdmissionTracker>,
        directory: Arc<dyn Directory>,
        connector: Arc<dyn Connector>,
        maintenance: Arc<dyn MaintenanceStatus>,
        consent: Option<Arc<ConsentManager>>,
        blocker: Arc<dyn ReconnectBlocker>,
    ) -> Self {
        Self {
            defaults,
            registry,
            channel_store,
            tracker,
            directory,
            connector,
            maintenance,
            consent,
            blocker,
        }
    }

    /// Entry point for one cascade. Guards: the client must be active,
    /// not externally blocked, past the consent gate, and not already
    /// mid-cascade.
    pub async fn request_reconnect(&self, client: &ClientRef) {
        if !client.is_active() {
            return;
        }
        if self.blocker.is_blocked(client.id()) {
            return;
        }
        if let Some(consent) = &self.consent {
            if consent.is_consent_required(client).await {
                return;
            }
        }
        if self.tracker.is_connecting(client.id()) {
            return;
        }

        let previous = self.tracker.previous_server(client.id());
        let candidates = self.resolve_candidate_servers(client, &previous).await;
        if candidates.is_empty() {
            return;
        }

        self.attempt(client, &candidates).await;
    }

    /// Ordered candidate list for the client.
    ///
    /// The group owning the previous instance wins; an ungrouped previous
    /// instance falls back to the client's stored affinity group, then the
    /// configured default group. Members are filtered by anti-affinity
    /// (current channel excluded only while the group has more than one
    /// member) and sorted ascending by occupancy counter, ties keeping
    /// declaration order. No applicable group means the single previous
    /// instance is the whole list.
    pub async fn resolve_candidate_servers(
        &self,
        client: &ClientRef,
        previous: &str,
    ) -> Vec<String> {
        let excluded = self.channel_store.current_channel(client.id()).await;

        let mut group = self.registry.group_for_server(previous);
        if group.is_none() {
            let last_group = self
                .channel_store
                .last_group(client.id())
                .await
                .unwrap_or_else(|| self.defaults.default_group.clone());
            group = self.registry.group(&last_group);
        }

        let Some(group) = group else {
            return vec![previous.to_string()];
        };

        let member_count = group.servers().len();
        let mut candidates: Vec<String> = group
            .servers()
            .iter()
            .filter(|server| match &excluded {
                Some(excluded) if member_count > 1 => !names_match(server, excluded),
                _ => true,
            })
            .filter(|server| self.directory.has_server(server))
            .cloned()
            .collect();

        if candidates.is_empty() {
            return vec![previous.to_string()];
        }

        let mut keyed = Vec::with_capacity(candidates.len());
        for server in candidates.drain(..) {
            let count = self.channel_store.channel_count(&server).await;
            keyed.push((count, server));
        }
        // Stable sort keeps declaration order for equal counters.
        keyed.sort_by_key(|(count, _)| *count);
        keyed.into_iter().map(|(_, server)| server).collect()
    }

    /// Probe candidates in order and connect to the first eligible one.
    async fn attempt(&self, client: &ClientRef, candidates: &[String]) {
        for candidate in candidates {
            if !client.is_active() {
                return;
            }

            let status = match self.directory.ping(candidate).await {
                Ok(status) => status,
                Err(error) => {
                    tracing::debug!(server = %candidate, %error, "probe failed, advancing");
                    continue;
                }
            };

            // An instance that withholds player counts is not usable.
            let Some(players) = status.players else {
                continue;
            };
            if players.online >= players.max {
                continue;
            }

            // The occupancy counter is our own source of truth, checked
            // independently of the probe's self-reported figure.
            if let Some(group) = self.registry.group_for_server(candidate) {
                if group.max_players() > 0 {
                    let count = self.channel_store.channel_count(candidate).await;
                    if count >= i64::from(group.max_players()) {
                        continue;
                    }
                }
            }

            if self.maintenance.is_under_maintenance(candidate) {
                if has_maintenance_bypass(client, candidate, &*self.maintenance) {
                    tracing::info!(
                        client = %client.name(),
                        server = %candidate,
                        "maintenance bypass"
                    );
                } else {
                    continue;
                }
            }

            if !client.is_active() {
                return;
            }

            // Another cascade may have started while we were probing.
            if !self.tracker.begin_connecting(client.id()) {
                return;
            }

            tracing::info!(client = %client.name(), server = %candidate, "connecting");
            let outcome = self.connector.connect(client, candidate).await;
            self.handle_outcome(client, candidate, outcome);
            // Terminal after an issued connect, whatever the outcome.
            return;
        }
    }

    fn handle_outcome(&self, client: &ClientRef, server: &str, outcome: ConnectOutcome) {
        self.tracker.end_connecting(client.id());

        match outcome {
            ConnectOutcome::Connected => {
                tracing::info!(client = %client.name(), %server, "reconnected");
                self.tracker.clear_issue(client.id());
            }
            ConnectOutcome::AlreadyInProgress => {}
            ConnectOutcome::Refused { reason } => {
                tracing::info!(
                    client = %client.name(),
                    %server,
                    %reason,
                    "connect refused"
                );
                let folded = reason.to_lowercase();
                if folded.contains("ban") {
                    client.send_notice(Notice::Banned);
                    self.tracker.set_issue(client.id(), "banned");
                    // Stop the client from blocking others in its queue.
                    self.tracker.remove_from_queue(client.id());
                } else if folded.contains("whitelist") {
                    client.send_notice(Notice::NotWhitelisted);
                    self.tracker.set_issue(client.id(), "not_whitelisted");
                    self.tracker.remove_from_queue(client.id());
                } else {
                    client.send_notice(Notice::ConnectFailed { reason });
                }
            }
        }
    }
}
