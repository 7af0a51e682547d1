// tests/integration/dispatcher_test.rs

//! Integration tests for routing and fan-out

use super::test_helpers::{FailingSink, StalledSink, TestContext};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use wsrelay::config::Config;

#[tokio::test]
async fn test_direct_delivery_counts_only_connected() {
    let ctx = TestContext::new();
    let one = ctx.connect("1");
    let three = ctx.connect("3");

    let report = ctx
        .route_oneshot(r#"{"type":"chat","message":"hi","user_ids":["1","2","3","4"]}"#)
        .await;

    assert_eq!(report.resolved, 4);
    assert_eq!(report.attempted(), 2);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.offline, 2);
    assert_eq!(one.frame_count(), 1);
    assert_eq!(three.frame_count(), 1);
}

#[tokio::test]
async fn test_group_delivery_is_verbatim() {
    let ctx = TestContext::new();
    let alice = ctx.connect("alice");
    let bob = ctx.connect("bob");
    ctx.state.groups.join("room1", "alice");
    ctx.state.groups.join("room1", "bob");

    let frame = r#"{"type":"chat",  "message":"hello room","room":"room1"}"#;
    let report = ctx.route_from("carol", frame).await;

    assert_eq!(report.delivered, 2);
    assert_eq!(alice.frames(), vec![frame.to_string()]);
    assert_eq!(bob.frames(), vec![frame.to_string()]);
}

#[tokio::test]
async fn test_group_takes_precedence_over_user_ids() {
    let ctx = TestContext::new();
    let alice = ctx.connect("alice");
    let bob = ctx.connect("bob");
    ctx.state.groups.join("room1", "alice");

    let report = ctx
        .route_from(
            "carol",
            r#"{"type":"chat","message":"x","room":"room1","user_ids":["bob"]}"#,
        )
        .await;

    assert_eq!(report.delivered, 1);
    assert_eq!(alice.frame_count(), 1);
    assert_eq!(bob.frame_count(), 0);
}

#[tokio::test]
async fn test_unknown_group_delivers_nothing() {
    let ctx = TestContext::new();
    let alice = ctx.connect("alice");

    let report = ctx
        .route_from("alice", r#"{"type":"chat","message":"x","room":"nowhere"}"#)
        .await;

    assert!(report.unknown_group);
    assert_eq!(report.attempted(), 0);
    assert_eq!(alice.frame_count(), 0);
}

#[tokio::test]
async fn test_message_without_target_is_dropped() {
    let ctx = TestContext::new();
    let alice = ctx.connect("alice");

    let report = ctx.route_from("alice", r#"{"type":"chat","message":"x"}"#).await;

    assert_eq!(report.resolved, 0);
    assert_eq!(report.attempted(), 0);
    assert_eq!(alice.frame_count(), 0);
}

#[tokio::test]
async fn test_duplicate_membership_delivers_twice() {
    let ctx = TestContext::new();
    let alice = ctx.connect("alice");
    ctx.state.groups.join("room1", "alice");
    ctx.state.groups.join("room1", "alice");

    let report = ctx
        .route_from("bob", r#"{"type":"chat","message":"x","room":"room1"}"#)
        .await;

    assert_eq!(report.resolved, 2);
    assert_eq!(report.delivered, 2);
    assert_eq!(alice.frame_count(), 2);
}

#[tokio::test]
async fn test_offline_group_members_are_skipped() {
    let ctx = TestContext::new();
    let alice = ctx.connect("alice");
    ctx.state.groups.join("room1", "alice");
    ctx.state.groups.join("room1", "ghost");

    let report = ctx
        .route_from("bob", r#"{"type":"chat","message":"x","room":"room1"}"#)
        .await;

    assert_eq!(report.delivered, 1);
    assert_eq!(report.offline, 1);
    assert_eq!(alice.frame_count(), 1);
}

#[tokio::test]
async fn test_sender_receives_own_message_by_default() {
    let ctx = TestContext::new();
    let alice = ctx.connect("alice");
    ctx.state.groups.join("room1", "alice");

    let report = ctx
        .route_from("alice", r#"{"type":"chat","message":"x","room":"room1"}"#)
        .await;

    assert_eq!(report.delivered, 1);
    assert_eq!(alice.frame_count(), 1);
}

#[tokio::test]
async fn test_sender_skipped_when_echo_disabled() {
    let mut config = Config::default();
    config.delivery.echo_to_sender = false;
    let ctx = TestContext::with_config(config);
    let alice = ctx.connect("alice");
    let bob = ctx.connect("bob");
    ctx.state.groups.join("room1", "alice");
    ctx.state.groups.join("room1", "bob");

    let report = ctx
        .route_from("alice", r#"{"type":"chat","message":"x","room":"room1"}"#)
        .await;

    assert_eq!(report.skipped_self, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(alice.frame_count(), 0);
    assert_eq!(bob.frame_count(), 1);
}

#[tokio::test]
async fn test_oneshot_ignores_echo_policy() {
    let mut config = Config::default();
    config.delivery.echo_to_sender = false;
    let ctx = TestContext::with_config(config);
    let alice = ctx.connect("alice");

    let report = ctx
        .route_oneshot(r#"{"type":"chat","message":"x","user_ids":["alice"]}"#)
        .await;

    assert_eq!(report.delivered, 1);
    assert_eq!(alice.frame_count(), 1);
}

#[tokio::test]
async fn test_failed_write_does_not_stop_fan_out() {
    let ctx = TestContext::new();
    let broken = Arc::new(FailingSink::default());
    ctx.connect_with("broken", broken.clone());
    let alice = ctx.connect("alice");

    let report = ctx
        .route_oneshot(r#"{"type":"chat","message":"x","user_ids":["broken","alice"]}"#)
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.attempted(), 2);
    assert_eq!(broken.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(alice.frame_count(), 1);
    // A failed write leaves the registration alone; the session's own read
    // loop owns cleanup.
    assert!(ctx.state.registry.lookup("broken").is_some());
}

#[tokio::test]
async fn test_stalled_recipient_times_out() {
    let ctx = TestContext::with_write_timeout(50);
    ctx.connect_with("stalled", Arc::new(StalledSink));
    let alice = ctx.connect("alice");
    ctx.state.groups.join("room1", "stalled");
    ctx.state.groups.join("room1", "alice");

    let report = tokio::time::timeout(
        Duration::from_secs(2),
        ctx.route_from("bob", r#"{"type":"chat","message":"x","room":"room1"}"#),
    )
    .await
    .expect("fan-out must not wait on a stalled peer");

    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(alice.frame_count(), 1);
}

#[tokio::test]
async fn test_stalled_recipient_does_not_block_other_fan_outs() {
    let ctx = TestContext::with_write_timeout(0);
    ctx.connect_with("stalled", Arc::new(StalledSink));
    let alice = ctx.connect("alice");
    ctx.state.groups.join("room1", "stalled");

    // This fan-out never finishes: writes are unbounded and the peer never reads.
    let state = ctx.state.clone();
    let stuck = tokio::spawn(async move {
        let frame = r#"{"type":"chat","message":"x","room":"room1"}"#;
        let message = wsrelay::core::Message::parse(frame).unwrap();
        state
            .dispatcher()
            .route(&message, frame, wsrelay::core::Origin::OneShot)
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Registry and group store stay usable for everyone else.
    ctx.state.groups.join("room1", "alice");
    let report = tokio::time::timeout(
        Duration::from_secs(2),
        ctx.route_oneshot(r#"{"type":"chat","message":"y","user_ids":["alice"]}"#),
    )
    .await
    .expect("unrelated fan-out must complete");
    assert_eq!(report.delivered, 1);
    assert_eq!(alice.frame_count(), 1);

    stuck.abort();
}

#[tokio::test]
async fn test_concurrent_fan_outs_with_joins_complete() {
    let ctx = TestContext::new();
    let mut sinks = Vec::new();
    for i in 0..20 {
        let user_id = format!("user-{i}");
        sinks.push(ctx.connect(&user_id));
        ctx.state.groups.join("room1", &user_id);
    }

    let mut handles = Vec::new();
    for i in 0..50 {
        let state = ctx.state.clone();
        handles.push(tokio::spawn(async move {
            if i % 5 == 0 {
                state.groups.join("room1", &format!("late-{i}"));
            }
            let frame = format!(r#"{{"type":"chat","message":"{i}","room":"room1"}}"#);
            let message = wsrelay::core::Message::parse(&frame).unwrap();
            state
                .dispatcher()
                .route(&message, &frame, wsrelay::core::Origin::OneShot)
                .await
        }));
    }

    let all = tokio::time::timeout(Duration::from_secs(5), futures::future::join_all(handles))
        .await
        .expect("concurrent fan-outs must not deadlock");
    for report in all {
        assert_eq!(report.unwrap().delivered, 20);
    }
    for sink in sinks {
        assert_eq!(sink.frame_count(), 50);
    }
}

#[tokio::test]
async fn test_disconnect_during_fan_out_is_safe() {
    let ctx = TestContext::new();
    let mut sinks = Vec::new();
    for i in 0..20 {
        let user_id = format!("user-{i}");
        sinks.push(ctx.connect(&user_id));
        ctx.state.groups.join("room1", &user_id);
    }

    let state = ctx.state.clone();
    let remover = tokio::spawn(async move {
        for i in (0..20).step_by(2) {
            state.registry.unregister(&format!("user-{i}"));
            tokio::task::yield_now().await;
        }
    });
    let report = ctx
        .route_oneshot(r#"{"type":"chat","message":"x","user_ids":[]}"#)
        .await;
    assert_eq!(report.resolved, 0);

    let group_report = ctx
        .route_from("x", r#"{"type":"chat","message":"x","room":"room1"}"#)
        .await;
    remover.await.unwrap();

    assert_eq!(group_report.resolved, 20);
    assert_eq!(group_report.delivered + group_report.offline, 20);
}
