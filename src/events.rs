//! Host lifecycle event handlers.
//!
//! # Responsibilities
//! - Translate the host's connection lifecycle feed (pre-connect intent,
//!   post-connect, disconnect, shutdown) into tracker and store mutations
//! - Park grouped or queued targets in the holding area
//!
//! The host calls these from its event bus; they never block on anything
//! but single-shot store operations.

use crate::host::{names_match, ClientRef, Notice};
use crate::routing::RouterContext;

/// Verdict for a pre-connect intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreConnectAction {
    /// Let the host proceed with the original target.
    Allow,
    /// Send the client to this instance instead.
    Redirect(String),
}

/// Intercept a client's intent to connect to `intended`.
pub async fn handle_pre_connect(
    ctx: &RouterContext,
    client: &ClientRef,
    intended: &str,
) -> PreConnectAction {
    let limbo = &ctx.defaults.limbo_server;

    // Consent outstanding: remember the grouped target, park and prompt.
    if let Some(consent) = &ctx.consent {
        if consent.is_consent_required(client).await {
            if ctx.registry.group_for_server(intended).is_some() {
                ctx.tracker.set_intended_server(client.id(), intended);
            }
            consent.send_prompt(client);
            if !names_match(intended, limbo) {
                return PreConnectAction::Redirect(limbo.clone());
            }
            return PreConnectAction::Allow;
        }
    }

    // Initial join: steer by stored affinity before anything else.
    let mut target = intended.to_string();
    if client.current_server().is_none() {
        let last_group = ctx
            .channel_store
            .last_group(client.id())
            .await
            .unwrap_or_else(|| ctx.defaults.default_group.clone());
        let excluded = ctx.channel_store.current_channel(client.id()).await;
        let selected = ctx
            .registry
            .select_server_for_group(&last_group, &*ctx.channel_store, excluded.as_deref())
            .await
            .filter(|name| ctx.directory.has_server(name));
        if let Some(selected) = selected {
            target = selected;
        }
    }

    let steered = if names_match(&target, intended) {
        PreConnectAction::Allow
    } else {
        PreConnectAction::Redirect(target.clone())
    };

    // Already heading to the holding area: nothing more to decide.
    if names_match(&target, limbo) {
        return steered;
    }

    // The engine itself is moving the client; let it pass.
    if ctx.tracker.is_connecting(client.id()) {
        return steered;
    }

    // Grouped targets always park first so they queue and wait when the
    // instances are offline.
    if let Some(group) = ctx.registry.group_for_server(&target) {
        ctx.tracker.set_intended_server(client.id(), &target);
        tracing::info!(
            client = %client.name(),
            group = %group.name(),
            target = %target,
            "parking client in holding area (grouped target)"
        );
        return PreConnectAction::Redirect(limbo.clone());
    }

    // Targets with a waiting queue park as well, so walk-ins cannot jump it.
    if ctx.tracker.has_queued_clients(&target) {
        tracing::info!(
            client = %client.name(),
            target = %target,
            "parking client in holding area (target queued)"
        );
        return PreConnectAction::Redirect(limbo.clone());
    }

    steered
}

/// Record an observed arrival. `previous` is the instance the client came
/// from, if any; the current instance is read from the client handle.
pub async fn handle_post_connect(ctx: &RouterContext, client: &ClientRef, previous: Option<&str>) {
    let limbo = &ctx.defaults.limbo_server;

    let Some(current) = client.current_server() else {
        tracing::error!(client = %client.name(), "post-connect with no current instance");
        return;
    };

    let previous_group =
        previous.and_then(|server| ctx.registry.group_for_server(server));
    if let (Some(prev), Some(_)) = (previous, previous_group) {
        if !names_match(prev, &current) {
            ctx.channel_store.decrement_channel_count(prev).await;
        }
    }

    let current_group = ctx.registry.group_for_server(&current);
    if current_group.is_some() {
        ctx.channel_store.increment_channel_count(&current).await;
    }

    ctx.channel_store
        .set_current_channel(client.id(), &current)
        .await;

    if let (Some(group), true) = (previous_group, names_match(&current, limbo)) {
        // Parked: affinity points back at where the client came from.
        ctx.channel_store
            .set_last_group(client.id(), group.name())
            .await;
    } else if let Some(group) = current_group {
        ctx.channel_store
            .set_last_group(client.id(), group.name())
            .await;
    }

    // Leaving the holding area toward a real instance ends the stay.
    if let Some(prev) = previous {
        if names_match(prev, limbo) {
            ctx.tracker.remove_client(client.id());
            return;
        }
    }

    if !names_match(&current, limbo) {
        return;
    }

    // Just arrived in the holding area: resolve where it should go.
    let mut intended = ctx.tracker.consume_intended_server(client.id());

    if intended.is_none() {
        if let Some(prev) = previous {
            if let Some(group) = previous_group {
                let excluded = ctx
                    .channel_store
                    .current_channel(client.id())
                    .await
                    .unwrap_or_else(|| prev.to_string());
                intended = ctx
                    .registry
                    .select_server_for_group(group.name(), &*ctx.channel_store, Some(&excluded))
                    .await
                    .filter(|name| ctx.directory.has_server(name));
            }
            if intended.is_none() {
                intended = Some(prev.to_string());
            }
        } else {
            let last_group = ctx
                .channel_store
                .last_group(client.id())
                .await
                .unwrap_or_else(|| ctx.defaults.default_group.clone());
            let excluded = ctx.channel_store.current_channel(client.id()).await;
            intended = ctx
                .registry
                .select_server_for_group(&last_group, &*ctx.channel_store, excluded.as_deref())
                .await
                .filter(|name| ctx.directory.has_server(name))
                .or_else(|| ctx.defaults.direct_connect_server.clone());
        }
    }

    ctx.tracker.add_client(client, intended.as_deref()).await;
    ctx.tracker.enqueue_client(client).await;

    if let Some(consent) = &ctx.consent {
        if consent.is_consent_required(client).await {
            consent.send_prompt(client);
        }
    }
}

/// A client left the proxy entirely.
pub async fn handle_disconnect(ctx: &RouterContext, client: &ClientRef) {
    if let Some(current) = client.current_server() {
        if let Some(group) = ctx.registry.group_for_server(&current) {
            ctx.channel_store.decrement_channel_count(&current).await;
            ctx.channel_store
                .set_last_group(client.id(), group.name())
                .await;
        }
    }
    ctx.channel_store.clear_current_channel(client.id()).await;

    ctx.tracker.remove_client(client.id());
    ctx.tracker.clear_issue(client.id());
    ctx.blocker.unblock(client.id());
}

/// Graceful shutdown flush: persist affinity and release occupancy for
/// every connected client so a restart starts from clean counters.
pub async fn handle_shutdown(ctx: &RouterContext) {
    for client in ctx.directory.all_clients() {
        let current = client.current_server();
        let in_limbo = current
            .as_deref()
            .map(|server| names_match(server, &ctx.defaults.limbo_server))
            .unwrap_or(false);

        let source = if current.is_none() || in_limbo {
            Some(ctx.tracker.previous_server(client.id()))
        } else {
            current.clone()
        };

        if let Some(source) = source {
            if let Some(group) = ctx.registry.group_for_server(&source) {
                if !in_limbo && current.is_some() {
                    ctx.channel_store.decrement_channel_count(&source).await;
                }
                ctx.channel_store
                    .set_last_group(client.id(), group.name())
                    .await;
            }
        }
        ctx.channel_store.clear_current_channel(client.id()).await;
    }
}

/// A client accepted the consent prompt (chat keyword or command).
pub async fn accept_consent(ctx: &RouterContext, client: &ClientRef) {
    let Some(consent) = &ctx.consent else {
        return;
    };

    if consent.has_consent(client).await {
        client.send_notice(Notice::ConsentAlreadyAccepted);
        return;
    }

    consent.accept(client).await;
    client.send_notice(Notice::ConsentAccepted);
    ctx.tracker.enqueue_client(client).await;
}
