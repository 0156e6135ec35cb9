//! Admission tracker behavior: registration, queues, pruning.

mod common;

use common::{build_ctx, test_config, FakeClient, TestHost};
use limbo_router::host::{Client, Notice, ReconnectBlocker};

#[tokio::test]
async fn add_client_is_idempotent() {
    let host = TestHost::new(&["limbo", "alpha", "beta"]);
    let ctx = build_ctx(&test_config(), &host).await;

    let client = FakeClient::new("ari");
    let handle = client.handle();
    ctx.tracker.add_client(&handle, Some("alpha")).await;
    ctx.tracker.add_client(&handle, Some("beta")).await;

    assert_eq!(client.notice_count(&Notice::Welcome), 1);
    assert_eq!(client.notice_count(&Notice::QueueJoined { position: 1 }), 1);
    // The second call changed nothing, including the fallback target.
    assert_eq!(ctx.previous_server(&handle), "alpha");
}

#[tokio::test]
async fn queue_order_is_fifo() {
    let host = TestHost::new(&["limbo", "alpha", "beta"]);
    let ctx = build_ctx(&test_config(), &host).await;

    let first = FakeClient::new("one");
    let second = FakeClient::new("two");
    let third = FakeClient::new("three");
    ctx.tracker.add_client(&first.handle(), Some("alpha")).await;
    ctx.tracker.add_client(&second.handle(), Some("alpha")).await;
    ctx.tracker.add_client(&third.handle(), Some("alpha")).await;

    assert_eq!(ctx.queue_position(&first.handle()), 1);
    assert_eq!(ctx.queue_position(&second.handle()), 2);
    assert_eq!(ctx.queue_position(&third.handle()), 3);

    let head = ctx.tracker.next_queued("alpha").unwrap();
    assert_eq!(head.id(), first.handle().id());
    // Peeking does not dequeue.
    assert_eq!(ctx.queue_position(&first.handle()), 1);
}

#[tokio::test]
async fn queues_are_case_insensitive_per_instance() {
    let host = TestHost::new(&["limbo", "alpha", "beta"]);
    let ctx = build_ctx(&test_config(), &host).await;

    let client = FakeClient::new("bo");
    ctx.tracker.add_client(&client.handle(), Some("Alpha")).await;

    assert!(ctx.tracker.has_queued_clients("ALPHA"));
    assert!(ctx.tracker.has_queued_clients("alpha"));
    assert!(!ctx.tracker.has_queued_clients("beta"));
}

#[tokio::test]
async fn prune_drops_inactive_clients() {
    let host = TestHost::new(&["limbo", "alpha", "beta"]);
    let ctx = build_ctx(&test_config(), &host).await;

    let alive = FakeClient::new("alive");
    let dead = FakeClient::new("dead");
    ctx.tracker.add_client(&alive.handle(), Some("alpha")).await;
    ctx.tracker.add_client(&dead.handle(), Some("alpha")).await;

    dead.set_active(false);
    ctx.tracker.prune_inactive();

    assert!(ctx.tracker.is_registered(alive.handle().id()));
    assert!(!ctx.tracker.is_registered(dead.handle().id()));
    assert_eq!(ctx.queue_position(&alive.handle()), 1);
    assert_eq!(ctx.queue_position(&dead.handle()), -1);
}

#[tokio::test]
async fn blocked_clients_are_not_admitted() {
    let host = TestHost::new(&["limbo", "alpha", "beta"]);
    let ctx = build_ctx(&test_config(), &host).await;

    let client = FakeClient::new("held");
    let handle = client.handle();
    host.blocker.block(handle.id());

    ctx.tracker.add_client(&handle, Some("alpha")).await;

    assert!(!ctx.tracker.is_registered(handle.id()));
    assert!(client.notices().is_empty());
}

#[tokio::test]
async fn remove_client_clears_every_trace() {
    let host = TestHost::new(&["limbo", "alpha", "beta"]);
    let ctx = build_ctx(&test_config(), &host).await;

    let client = FakeClient::new("gone");
    let handle = client.handle();
    ctx.tracker.add_client(&handle, Some("alpha")).await;
    ctx.tracker.set_intended_server(handle.id(), "beta");
    ctx.tracker.begin_connecting(handle.id());

    ctx.tracker.remove_client(handle.id());

    assert!(!ctx.tracker.is_registered(handle.id()));
    assert_eq!(ctx.queue_position(&handle), -1);
    assert!(!ctx.tracker.is_connecting(handle.id()));
    assert!(ctx.tracker.consume_intended_server(handle.id()).is_none());
}

#[tokio::test]
async fn previous_server_falls_back_through_the_chain() {
    let host = TestHost::new(&["limbo", "alpha", "beta"]);
    let ctx = build_ctx(&test_config(), &host).await;

    let registered = FakeClient::new("reg");
    ctx.tracker
        .add_client(&registered.handle(), Some("beta"))
        .await;
    assert_eq!(ctx.previous_server(&registered.handle()), "beta");

    // Unregistered: first instance of the default group.
    let unknown = FakeClient::new("unknown");
    assert_eq!(ctx.previous_server(&unknown.handle()), "alpha");
}

#[tokio::test]
async fn unknown_fallback_resolves_to_direct_connect() {
    let host = TestHost::new(&["limbo", "alpha", "beta"]);
    let mut config = test_config();
    config.direct_connect_server = Some("beta".to_string());
    let ctx = build_ctx(&config, &host).await;

    let client = FakeClient::new("lost");
    let handle = client.handle();
    ctx.tracker.add_client(&handle, Some("not-a-server")).await;

    assert_eq!(ctx.previous_server(&handle), "beta");
}

#[tokio::test]
async fn intended_server_is_read_once() {
    let host = TestHost::new(&["limbo", "alpha", "beta"]);
    let ctx = build_ctx(&test_config(), &host).await;

    let client = FakeClient::new("aim");
    let handle = client.handle();

    ctx.tracker.set_intended_server(handle.id(), "beta");
    assert_eq!(
        ctx.tracker.consume_intended_server(handle.id()).as_deref(),
        Some("beta")
    );
    assert!(ctx.tracker.consume_intended_server(handle.id()).is_none());

    // Targets that vanished from the directory are dropped on read.
    ctx.tracker.set_intended_server(handle.id(), "retired");
    assert!(ctx.tracker.consume_intended_server(handle.id()).is_none());
}
