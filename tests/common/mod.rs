//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use limbo_router::config::{ConsentStorageKind, GroupConfig, RouterConfig};
use limbo_router::host::{
    Client, ClientRef, ConnectOutcome, Connector, Directory, MaintenanceStatus,
    MemoryReconnectBlocker, Notice, PingError, PingStatus, PlayerCounts,
};
use limbo_router::routing::{HostServices, RouterContext};

pub struct FakeClient {
    id: Uuid,
    name: String,
    active: AtomicBool,
    permissions: Mutex<HashSet<String>>,
    current: Mutex<Option<String>>,
    notices: Mutex<Vec<Notice>>,
}

impl FakeClient {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            active: AtomicBool::new(true),
            permissions: Mutex::new(HashSet::new()),
            current: Mutex::new(None),
            notices: Mutex::new(Vec::new()),
        })
    }

    pub fn handle(self: &Arc<Self>) -> ClientRef {
        self.clone()
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn grant(&self, node: &str) {
        self.permissions.lock().unwrap().insert(node.to_string());
    }

    pub fn set_current_server(&self, server: Option<&str>) {
        *self.current.lock().unwrap() = server.map(ToString::to_string);
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn notice_count(&self, wanted: &Notice) -> usize {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|n| *n == wanted)
            .count()
    }
}

impl Client for FakeClient {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn has_permission(&self, node: &str) -> bool {
        self.permissions.lock().unwrap().contains(node)
    }

    fn current_server(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    fn send_notice(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Directory with scripted ping outcomes. Unscripted instances answer as
/// reachable with plenty of room.
pub struct FakeDirectory {
    servers: Vec<String>,
    pings: Mutex<HashMap<String, VecDeque<Result<PingStatus, PingError>>>>,
    ping_log: Mutex<Vec<String>>,
    placements: Mutex<HashMap<String, Vec<ClientRef>>>,
}

impl FakeDirectory {
    pub fn new(servers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            servers: servers.iter().map(ToString::to_string).collect(),
            pings: Mutex::new(HashMap::new()),
            ping_log: Mutex::new(Vec::new()),
            placements: Mutex::new(HashMap::new()),
        })
    }

    /// Queue one probe response for an instance; responses are consumed
    /// in order, after which the default (reachable, empty) applies.
    pub fn script_ping(&self, server: &str, response: Result<PingStatus, PingError>) {
        self.pings
            .lock()
            .unwrap()
            .entry(server.to_ascii_lowercase())
            .or_default()
            .push_back(response);
    }

    pub fn script_unreachable(&self, server: &str) {
        self.script_ping(server, Err(PingError::Unreachable("scripted".to_string())));
    }

    pub fn script_full(&self, server: &str) {
        self.script_ping(
            server,
            Ok(PingStatus {
                players: Some(PlayerCounts { online: 10, max: 10 }),
            }),
        );
    }

    pub fn place(&self, server: &str, client: &ClientRef) {
        self.placements
            .lock()
            .unwrap()
            .entry(server.to_ascii_lowercase())
            .or_default()
            .push(client.clone());
    }

    pub fn ping_log(&self) -> Vec<String> {
        self.ping_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    fn has_server(&self, name: &str) -> bool {
        self.servers.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    fn server_names(&self) -> Vec<String> {
        self.servers.clone()
    }

    fn clients_on(&self, name: &str) -> Vec<ClientRef> {
        self.placements
            .lock()
            .unwrap()
            .get(&name.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    fn all_clients(&self) -> Vec<ClientRef> {
        self.placements
            .lock()
            .unwrap()
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    async fn ping(&self, name: &str) -> Result<PingStatus, PingError> {
        self.ping_log.lock().unwrap().push(name.to_string());
        let scripted = self
            .pings
            .lock()
            .unwrap()
            .get_mut(&name.to_ascii_lowercase())
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(response) => response,
            None => Ok(PingStatus {
                players: Some(PlayerCounts { online: 0, max: 100 }),
            }),
        }
    }
}

/// Connector replaying queued outcomes; unqueued calls succeed.
pub struct ScriptedConnector {
    outcomes: Mutex<VecDeque<ConnectOutcome>>,
    calls: Mutex<Vec<(Uuid, String)>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn script(&self, outcome: ConnectOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<(Uuid, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, client: &ClientRef, server: &str) -> ConnectOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((client.id(), server.to_string()));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectOutcome::Connected)
    }
}

#[derive(Default)]
pub struct FakeMaintenance {
    down: Mutex<HashSet<String>>,
    allow_listed: Mutex<HashSet<Uuid>>,
}

impl FakeMaintenance {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_under_maintenance(&self, server: &str) {
        self.down.lock().unwrap().insert(server.to_ascii_lowercase());
    }

    pub fn allow(&self, client: Uuid) {
        self.allow_listed.lock().unwrap().insert(client);
    }
}

impl MaintenanceStatus for FakeMaintenance {
    fn is_under_maintenance(&self, server: &str) -> bool {
        self.down
            .lock()
            .unwrap()
            .contains(&server.to_ascii_lowercase())
    }

    fn is_allow_listed(&self, client: &ClientRef) -> bool {
        self.allow_listed.lock().unwrap().contains(&client.id())
    }
}

pub struct TestHost {
    pub directory: Arc<FakeDirectory>,
    pub connector: Arc<ScriptedConnector>,
    pub maintenance: Arc<FakeMaintenance>,
    pub blocker: Arc<MemoryReconnectBlocker>,
}

impl TestHost {
    pub fn new(servers: &[&str]) -> Self {
        Self {
            directory: FakeDirectory::new(servers),
            connector: ScriptedConnector::new(),
            maintenance: FakeMaintenance::new(),
            blocker: Arc::new(MemoryReconnectBlocker::new()),
        }
    }

    pub fn services(&self) -> HostServices {
        HostServices {
            directory: self.directory.clone(),
            connector: self.connector.clone(),
            maintenance: self.maintenance.clone(),
            blocker: self.blocker.clone(),
        }
    }
}

/// Baseline configuration: one group "main" of alpha/beta, consent off,
/// everything in-memory.
pub fn test_config() -> RouterConfig {
    let mut config = RouterConfig::default();
    config.limbo_server = "limbo".to_string();
    config.consent.enabled = false;
    config.consent.storage.kind = ConsentStorageKind::Memory;
    config.groups.insert(
        "main".to_string(),
        GroupConfig {
            servers: vec!["alpha".to_string(), "beta".to_string()],
            max_players: 0,
        },
    );
    config
}

/// Install a per-test subscriber honoring `RUST_LOG`; repeat calls no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn build_ctx(config: &RouterConfig, host: &TestHost) -> Arc<RouterContext> {
    init_tracing();
    RouterContext::build(config, &std::env::temp_dir(), host.services()).await
}
