//! Periodic control loop.
//!
//! # Responsibilities
//! - Reconnection tick: prune, select, trigger cascades
//! - Notification tick: consent prompts, issue notices, queue positions
//!
//! Throughput is capped intentionally: queue mode attempts at most one
//! dequeue per instance per tick, non-queue mode moves at most one client
//! per tick, so a mass recovery never saturates the backends.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::host::{has_maintenance_bypass, Notice};
use crate::routing::RouterContext;

/// Owns the two periodic tasks. The host may instead call the tick
/// functions from its own scheduler; the contract is identical.
pub struct TickDriver {
    ctx: Arc<RouterContext>,
}

impl TickDriver {
    pub fn new(ctx: Arc<RouterContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let reconnect_every = Duration::from_millis(self.ctx.defaults.task_interval_ms);
        let notify_every = Duration::from_secs(self.ctx.defaults.queue_notify_interval_secs);

        tracing::info!(
            reconnect_interval_ms = self.ctx.defaults.task_interval_ms,
            notify_interval_secs = self.ctx.defaults.queue_notify_interval_secs,
            "tick driver starting"
        );

        let mut reconnect_ticker = time::interval(reconnect_every);
        let mut notify_ticker = time::interval(notify_every);

        loop {
            tokio::select! {
                _ = reconnect_ticker.tick() => {
                    run_reconnect_tick(&self.ctx).await;
                }
                _ = notify_ticker.tick() => {
                    run_notify_tick(&self.ctx).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("tick driver received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// One reconnection tick.
pub async fn run_reconnect_tick(ctx: &RouterContext) {
    let holding = ctx.directory.clients_on(&ctx.defaults.limbo_server);
    if holding.is_empty() {
        return;
    }

    ctx.tracker.prune_inactive();

    if ctx.defaults.queue_enabled {
        // At most one dequeue attempt per instance per tick.
        for server in ctx.directory.server_names() {
            if !ctx.tracker.has_queued_clients(&server) {
                continue;
            }

            if ctx.maintenance.is_under_maintenance(&server) {
                // Normal FIFO order would stall on a blocked head; pull
                // the first bypass holder instead.
                let allowed = ctx
                    .tracker
                    .first_maintenance_allowed(&server, &*ctx.maintenance);
                if let Some(client) = allowed {
                    if client.is_active() {
                        ctx.reconnector.request_reconnect(&client).await;
                    }
                }
            } else if let Some(client) = ctx.tracker.next_queued(&server) {
                ctx.reconnector.request_reconnect(&client).await;
            }
        }
    } else {
        // First eligible client only, then stop.
        for client in holding {
            if ctx.tracker.has_issue(client.id()) || !client.is_active() {
                continue;
            }
            if ctx.blocker.is_blocked(client.id()) {
                continue;
            }

            let previous = ctx.tracker.previous_server(client.id());
            if ctx.maintenance.is_under_maintenance(&previous)
                && !has_maintenance_bypass(&client, &previous, &*ctx.maintenance)
            {
                continue;
            }

            ctx.reconnector.request_reconnect(&client).await;
            break;
        }
    }
}

/// One notification tick. Each client receives at most one notice.
pub async fn run_notify_tick(ctx: &RouterContext) {
    for client in ctx.directory.clients_on(&ctx.defaults.limbo_server) {
        if let Some(consent) = &ctx.consent {
            if consent.is_consent_required(&client).await {
                consent.send_prompt(&client);
                continue;
            }
        }

        if let Some(issue) = ctx.tracker.issue(client.id()) {
            match issue.as_str() {
                "banned" => client.send_notice(Notice::Banned),
                "not_whitelisted" => client.send_notice(Notice::NotWhitelisted),
                _ => {}
            }
            continue;
        }

        let previous = ctx.tracker.previous_server(client.id());
        if ctx.maintenance.is_under_maintenance(&previous) {
            client.send_notice(Notice::Maintenance);
            continue;
        }

        if !ctx.defaults.queue_enabled {
            continue;
        }
        let position = ctx.tracker.queue_position(client.id());
        if position == -1 {
            continue;
        }
        client.send_notice(Notice::QueuePosition { position });
    }
}
