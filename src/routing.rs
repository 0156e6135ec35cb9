//! Engine wiring.
//!
//! # Responsibilities
//! - Build every component once at startup from configuration plus the
//!   host services, and hand out one shared context object
//! - Mirror the group topology into the channel store
//! - Expose the status query surface consumed by the host
//!
//! # Design Decisions
//! - No global registries: everything reaches its collaborators through
//!   this context, constructed once and passed by handle

use std::path::Path;
use std::sync::Arc;

use crate::admission::AdmissionTracker;
use crate::config::RouterConfig;
use crate::consent::ConsentManager;
use crate::group::GroupRegistry;
use crate::host::{ClientRef, Connector, Directory, MaintenanceStatus, ReconnectBlocker};
use crate::reconnect::Reconnector;
use crate::store::{build_channel_store, build_consent_store, ChannelStore};

/// Routing constants resolved once from configuration.
#[derive(Debug, Clone)]
pub struct RoutingDefaults {
    /// The always-available holding instance.
    pub limbo_server: String,
    /// Resolved direct-connect target, if any.
    pub direct_connect_server: Option<String>,
    /// Group consulted when a client has no recorded affinity.
    pub default_group: String,
    pub queue_enabled: bool,
    pub task_interval_ms: u64,
    pub queue_notify_interval_secs: u64,
}

/// Host-supplied collaborators, injected at construction.
pub struct HostServices {
    pub directory: Arc<dyn Directory>,
    pub connector: Arc<dyn Connector>,
    pub maintenance: Arc<dyn MaintenanceStatus>,
    pub blocker: Arc<dyn ReconnectBlocker>,
}

/// The one shared context object; lifecycle is process start to shutdown.
pub struct RouterContext {
    pub defaults: Arc<RoutingDefaults>,
    pub registry: Arc<GroupRegistry>,
    pub channel_store: Arc<dyn ChannelStore>,
    pub consent: Option<Arc<ConsentManager>>,
    pub tracker: Arc<AdmissionTracker>,
    pub reconnector: Arc<Reconnector>,
    pub directory: Arc<dyn Directory>,
    pub connector: Arc<dyn Connector>,
    pub maintenance: Arc<dyn MaintenanceStatus>,
    pub blocker: Arc<dyn ReconnectBlocker>,
}

impl RouterContext {
    /// Build the full engine. Store backends that fail to initialize fall
    /// back to in-memory; only a missing holding instance is fatal.
    pub async fn build(
        config: &RouterConfig,
        data_dir: &Path,
        host: HostServices,
    ) -> Arc<Self> {
        let registry = Arc::new(GroupRegistry::from_config(config));

        let direct_connect_server = config
            .direct_connect_server
            .clone()
            .filter(|name| !name.trim().is_empty() && host.directory.has_server(name))
            .or_else(|| {
                registry
                    .group(&config.default_group)
                    .and_then(|group| group.servers().first().cloned())
                    .filter(|name| host.directory.has_server(name))
            });

        let defaults = Arc::new(RoutingDefaults {
            limbo_server: config.limbo_server.clone(),
            direct_connect_server,
            default_group: config.default_group.clone(),
            queue_enabled: config.queue_enabled,
            task_interval_ms: config.task_interval_ms,
            queue_notify_interval_secs: config.queue_notify_interval_secs,
        });

        tracing::info!(
            limbo = %defaults.limbo_server,
            direct_connect = ?defaults.direct_connect_server,
            queue_enabled = defaults.queue_enabled,
            groups = registry.group_names().len(),
            "router context starting"
        );

        let channel_store = build_channel_store(&config.channel_storage).await;

        let consent = if config.consent.enabled {
            let store = build_consent_store(&config.consent.storage, data_dir);
            Some(Arc::new(ConsentManager::new(
                store,
                config.consent.prompt_cooldown_secs,
            )))
        } else {
            None
        };

        let tracker = Arc::new(AdmissionTracker::new(
            defaults.clone(),
            registry.clone(),
            host.directory.clone(),
            consent.clone(),
            host.blocker.clone(),
        ));

        let reconnector = Arc::new(Reconnector::new(
            defaults.clone(),
            registry.clone(),
            channel_store.clone(),
            tracker.clone(),
            host.directory.clone(),
            host.connector.clone(),
            host.maintenance.clone(),
            consent.clone(),
            host.blocker.clone(),
        ));

        let ctx = Arc::new(Self {
            defaults,
            registry,
            channel_store,
            consent,
            tracker,
            reconnector,
            directory: host.directory,
            connector: host.connector,
            maintenance: host.maintenance,
            blocker: host.blocker,
        });

        ctx.sync_group_data().await;

        ctx
    }

    /// Mirror the registry topology into the channel store so external
    /// tooling can introspect it without a second channel.
    async fn sync_group_data(&self) {
        let mut names = self.registry.group_names();
        names.sort();
        self.channel_store.store_groups(&names).await;
        for group in self.registry.groups() {
            self.channel_store
                .store_group_servers(group.name(), group.servers())
                .await;
            self.channel_store
                .store_group_max_players(group.name(), group.max_players())
                .await;
        }
    }

    // Query surface for host-side status display.

    pub fn previous_server(&self, client: &ClientRef) -> String {
        self.tracker.previous_server(client.id())
    }

    pub fn queue_position(&self, client: &ClientRef) -> i64 {
        self.tracker.queue_position(client.id())
    }

    pub fn has_connection_issue(&self, client: &ClientRef) -> bool {
        self.tracker.has_issue(client.id())
    }

    /// Externally-triggered reconnect attempt for one client.
    pub async fn request_reconnect(&self, client: &ClientRef) {
        self.reconnector.request_reconnect(client).await;
    }
}
