//! Routing and queueing engine for a holding-area ("limbo") instance.
//!
//! Clients that cannot reach their target instance are parked on an
//! always-available holding instance and moved back out by a periodic
//! reconnection tick. The engine tracks per-instance occupancy, balances
//! interchangeable instances within named channel groups, enforces an
//! optional consent gate, and honors host-side maintenance flags.
//!
//! The host proxy integrates by implementing the traits in [`host`],
//! building a [`routing::RouterContext`], forwarding its connection
//! lifecycle events to [`events`], and driving the periodic work either
//! through [`reconnect::TickDriver`] or its own scheduler.

pub mod admission;
pub mod config;
pub mod consent;
pub mod events;
pub mod group;
pub mod host;
pub mod reconnect;
pub mod routing;
pub mod store;

pub use config::{load_config, RouterConfig};
pub use events::{accept_consent, handle_disconnect, handle_post_connect, handle_pre_connect,
    handle_shutdown, PreConnectAction};
pub use host::{Client, ClientRef, ConnectOutcome, Connector, Directory, MaintenanceStatus,
    MemoryReconnectBlocker, NoMaintenance, Notice, PingError, PingStatus, PlayerCounts,
    ReconnectBlocker};
pub use reconnect::TickDriver;
pub use routing::{HostServices, RouterContext, RoutingDefaults};
