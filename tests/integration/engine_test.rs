//! Engine-level scenarios: presence, routing, hooks, and liveness, without a network.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, Utc};

use helpers::{HookPlugin, TestRelay, drain};
use relay_core::protocol::MessageType;
use relay_core::types::{Role, UserId};
use relay_plugin::prelude::*;
use relay_plugin::PluginState;
use relay_realtime::{RouteOutcome, RoutingError, close_code};

#[tokio::test]
async fn test_join_chat_and_force_disconnect() {
    let relay = TestRelay::new();

    let alice = relay.connect("alice").await;
    assert!(drain(&alice).messages.is_empty(), "nobody to announce alice to");

    let bob = relay.connect("bob").await;
    let joins = drain(&alice);
    assert_eq!(joins.of_kind(MessageType::Join).len(), 1);
    assert_eq!(joins.messages[0].sender(), "bob");
    assert!(drain(&bob).of_kind(MessageType::Join).is_empty());

    let outcome = relay.send(&bob, r#"{"type":1,"content":"hi"}"#).await;
    assert_eq!(outcome, RouteOutcome::Delivered { recipients: 2 });
    for handle in [&alice, &bob] {
        let inbox = drain(handle);
        assert_eq!(inbox.texts(), vec!["hi"]);
        assert_eq!(inbox.messages[0].sender(), "bob");
    }

    let closed = relay
        .engine
        .sessions
        .force_disconnect(&UserId::from("bob"), "spam");
    assert_eq!(closed, 1);

    let bob_inbox = drain(&bob);
    assert_eq!(
        bob_inbox.close,
        Some((close_code::KICKED, "Kicked: spam".to_string()))
    );
    let alice_inbox = drain(&alice);
    let leaves = alice_inbox.of_kind(MessageType::Leave);
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].sender(), "bob");
    assert!(!relay.engine.sessions.is_online(&UserId::from("bob")));
}

#[tokio::test]
async fn test_join_and_leave_once_per_session() {
    let relay = TestRelay::new();
    let alice = relay.connect("alice").await;

    let phone = relay.connect("bob").await;
    let laptop = relay.connect("bob").await;
    assert_eq!(drain(&alice).of_kind(MessageType::Join).len(), 1);
    assert_eq!(
        relay
            .engine
            .sessions
            .session(&UserId::from("bob"))
            .map(|s| s.connection_ids.len()),
        Some(2)
    );

    relay
        .engine
        .router
        .disconnect(&phone, close_code::NORMAL, "Client disconnected")
        .await;
    assert!(drain(&alice).of_kind(MessageType::Leave).is_empty());
    assert!(relay.engine.sessions.is_online(&UserId::from("bob")));

    relay
        .engine
        .router
        .disconnect(&laptop, close_code::NORMAL, "Client disconnected")
        .await;
    // A second teardown of the same connection changes nothing.
    relay
        .engine
        .router
        .disconnect(&laptop, close_code::NORMAL, "Client disconnected")
        .await;

    assert_eq!(drain(&alice).of_kind(MessageType::Leave).len(), 1);
    assert!(!relay.engine.sessions.is_online(&UserId::from("bob")));
    assert_eq!(relay.engine.sessions.count(), 1);
}

#[tokio::test]
async fn test_connection_cap_evicts_oldest_without_leave() {
    let relay = TestRelay::new();
    let alice = relay.connect("alice").await;

    let first = relay.connect("bob").await;
    let _second = relay.connect("bob").await;
    let _third = relay.connect("bob").await;
    let _fourth = relay.connect("bob").await;

    assert_eq!(
        drain(&first).close,
        Some((close_code::TOO_MANY_DEVICES, "Kicked: too many devices".to_string()))
    );
    let session = relay
        .engine
        .sessions
        .session(&UserId::from("bob"))
        .expect("bob is online");
    assert_eq!(session.connection_ids.len(), 3);
    assert!(!session.connection_ids.contains(&first.id()));
    assert!(drain(&alice).of_kind(MessageType::Leave).is_empty());
}

#[tokio::test]
async fn test_pre_message_veto_blocks_delivery_and_post_hooks() {
    let relay = TestRelay::new();
    let posted = Arc::new(AtomicUsize::new(0));
    let counter = posted.clone();

    relay
        .load(Arc::new(
            HookPlugin::new("moderation")
                .with_hook(
                    HookPhase::PreMessage,
                    FnHook::arc("filter", |ctx: HookContext| async move {
                        let blocked = ctx
                            .as_message()
                            .is_some_and(|m| m.content().contains("forbidden"));
                        Ok(if blocked {
                            HookAction::veto("forbidden word")
                        } else {
                            HookAction::Continue
                        })
                    }),
                )
                .with_hook(
                    HookPhase::PostMessage,
                    FnHook::arc("count", move |_ctx: HookContext| {
                        let counter = counter.clone();
                        async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(HookAction::Continue)
                        }
                    }),
                ),
        ))
        .await;

    let alice = relay.connect("alice").await;
    let bob = relay.connect("bob").await;
    drain(&alice);

    let outcome = relay
        .send(&bob, r#"{"type":1,"content":"some forbidden text"}"#)
        .await;
    assert_eq!(
        outcome,
        RouteOutcome::Vetoed {
            reason: "forbidden word".to_string()
        }
    );
    assert!(drain(&alice).texts().is_empty());
    assert_eq!(posted.load(Ordering::SeqCst), 0);

    let outcome = relay.send(&bob, r#"{"type":1,"content":"fine"}"#).await;
    assert_eq!(outcome, RouteOutcome::Delivered { recipients: 2 });
    assert_eq!(drain(&alice).texts(), vec!["fine"]);
    assert_eq!(posted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_faulting_plugin_does_not_block_delivery() {
    let relay = TestRelay::new();
    relay
        .load(Arc::new(
            HookPlugin::new("flaky")
                .with_hook(
                    HookPhase::PreMessage,
                    FnHook::arc("fails", |_ctx: HookContext| async move {
                        Err(HookError::new("backend unavailable"))
                    }),
                )
                .with_hook(
                    HookPhase::PreMessage,
                    FnHook::arc("panics", |_ctx: HookContext| async move {
                        if true {
                            panic!("hook bug");
                        }
                        Ok(HookAction::Continue)
                    }),
                ),
        ))
        .await;

    let alice = relay.connect("alice").await;
    let bob = relay.connect("bob").await;
    drain(&alice);

    for n in 0..5 {
        let outcome = relay
            .send(&bob, &format!(r#"{{"type":1,"content":"msg {n}"}}"#))
            .await;
        assert_eq!(outcome, RouteOutcome::Delivered { recipients: 2 });
    }
    assert_eq!(drain(&alice).texts().len(), 5);

    let plugins = relay.engine.plugins.list().await;
    let flaky = plugins
        .iter()
        .find(|p| p.descriptor.name == "flaky")
        .expect("flaky is listed");
    assert_eq!(flaky.state, PluginState::Suspended);

    let status = relay.engine.status().await;
    assert!(status.metrics.hook_faults >= 3);
}

#[tokio::test]
async fn test_unicast_to_offline_user_is_reported() {
    let relay = TestRelay::new();
    let alice = relay.connect("alice").await;
    let bob = relay.connect("bob").await;
    drain(&alice);
    drain(&bob);

    let outcome = relay
        .send(&alice, r#"{"type":1,"content":"psst","target":"carol"}"#)
        .await;
    assert_eq!(
        outcome,
        RouteOutcome::Undeliverable(RoutingError::RecipientOffline(UserId::from("carol")))
    );

    let notices = drain(&alice);
    let system = notices.of_kind(MessageType::System);
    assert_eq!(system.len(), 1);
    assert_eq!(system[0].content(), "User carol is not online");
    assert!(drain(&bob).messages.is_empty());
}

#[tokio::test]
async fn test_unicast_reaches_target_and_echoes_sender() {
    let relay = TestRelay::new();
    let alice = relay.connect("alice").await;
    let bob = relay.connect("bob").await;
    let carol = relay.connect("carol").await;
    for handle in [&alice, &bob, &carol] {
        drain(handle);
    }

    let outcome = relay
        .send(&alice, r#"{"type":1,"content":"psst","target":"bob"}"#)
        .await;
    assert_eq!(outcome, RouteOutcome::Delivered { recipients: 2 });
    assert_eq!(drain(&bob).texts(), vec!["psst"]);
    assert_eq!(drain(&alice).texts(), vec!["psst"]);
    assert!(drain(&carol).messages.is_empty());
}

#[tokio::test]
async fn test_idle_then_heartbeat_eviction() {
    let relay = TestRelay::new();
    let alice = relay.connect("alice").await;
    let bob = relay.connect("bob").await;
    let sessions = &relay.engine.sessions;

    let report = sessions.sweep_at(Utc::now() + Duration::seconds(16));
    assert_eq!(report.idled, 2);
    assert_eq!(report.evicted, 0);
    let status = sessions
        .session(&UserId::from("alice"))
        .map(|s| s.status.as_str());
    assert_eq!(status, Some("IDLE"));

    let report = sessions.sweep_at(Utc::now() + Duration::seconds(31));
    assert_eq!(report.evicted, 2);
    assert_eq!(sessions.count(), 0);

    let alice_inbox = drain(&alice);
    let bob_inbox = drain(&bob);
    for inbox in [&alice_inbox, &bob_inbox] {
        assert_eq!(
            inbox.close,
            Some((close_code::HEARTBEAT_TIMEOUT, "Heartbeat timeout".to_string()))
        );
    }
    // Whoever was evicted first is announced to the other; the last one to nobody.
    let leaves =
        alice_inbox.of_kind(MessageType::Leave).len() + bob_inbox.of_kind(MessageType::Leave).len();
    assert_eq!(leaves, 1);
}

#[tokio::test]
async fn test_builtin_commands_reply_to_issuer_only() {
    let relay = TestRelay::new();
    relay
        .engine
        .load_plugins(vec![Arc::new(plugin_builtin::BuiltinPlugin::new()) as Arc<dyn Plugin>])
        .await
        .expect("builtin loads");

    let alice = relay.connect("alice").await;
    let admin = relay.connect_as("root", Role::Admin).await;
    drain(&alice);

    let outcome = relay.send(&alice, r#"{"type":1,"content":"/echo hey"}"#).await;
    assert!(matches!(outcome, RouteOutcome::Command { faulted: false, .. }));
    let results = drain(&alice);
    let replies = results.of_kind(MessageType::CommandResult);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].content(), "Echo: hey");
    assert!(drain(&admin).of_kind(MessageType::CommandResult).is_empty());

    relay.send(&admin, r#"{"type":1,"content":"/kick alice"}"#).await;
    assert_eq!(
        drain(&alice).close,
        Some((close_code::KICKED, "Kicked: removed by admin".to_string()))
    );
    let replies = drain(&admin);
    assert_eq!(
        replies.of_kind(MessageType::CommandResult)[0].content(),
        "Kicked alice (1 connection(s))"
    );
}

#[tokio::test]
async fn test_shutdown_closes_everything() {
    let relay = TestRelay::new();
    relay.engine.start().await;
    let alice = relay.connect("alice").await;
    let bob = relay.connect("bob").await;

    relay.engine.shutdown().await;

    for handle in [&alice, &bob] {
        assert_eq!(
            drain(handle).close,
            Some((close_code::GOING_AWAY, "Server shutting down".to_string()))
        );
    }
    assert_eq!(relay.engine.registry.count(), 0);
    assert_eq!(relay.engine.sessions.count(), 0);
    assert!(relay.engine.shutdown_token().is_cancelled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_kick_during_graceful_disconnect_leaves_once() {
    for _ in 0..100 {
        let relay = TestRelay::new();
        let alice = relay.connect("alice").await;
        let phone = relay.connect("bob").await;
        let laptop = relay.connect("bob").await;
        drain(&alice);

        let mut tasks = Vec::new();
        for handle in [phone.clone(), laptop.clone()] {
            let engine = relay.engine.clone();
            tasks.push(tokio::spawn(async move {
                engine
                    .router
                    .disconnect(&handle, close_code::NORMAL, "Client disconnected")
                    .await;
            }));
        }
        let engine = relay.engine.clone();
        tasks.push(tokio::spawn(async move {
            engine.sessions.force_disconnect(&UserId::from("bob"), "spam");
        }));
        for task in tasks {
            task.await.expect("teardown task panicked");
        }

        assert_eq!(drain(&alice).of_kind(MessageType::Leave).len(), 1);
        assert!(relay.engine.sessions.session(&UserId::from("bob")).is_none());
        assert_eq!(relay.engine.registry.count(), 1);
    }
}
