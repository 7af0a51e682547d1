// tests/integration/session_test.rs

//! Integration tests for the session state machine

use super::test_helpers::{TestContext, wait_until};
use wsrelay::connection::SessionPhase;
use wsrelay::core::RelayError;

#[tokio::test]
async fn test_missing_user_id_closes_immediately() {
    let ctx = TestContext::new();
    let session = ctx.spawn_session(None, Some("room1"));
    let sink = session.sink.clone();

    let (result, phase) = session.finish().await;

    assert!(result.is_ok());
    assert_eq!(phase, SessionPhase::Closed);
    assert!(sink.is_closed());
    assert!(ctx.state.registry.is_empty());
    // The room is not joined without an identity.
    assert!(ctx.state.groups.members_of("room1").is_none());
}

#[tokio::test]
async fn test_empty_user_id_is_treated_as_missing() {
    let ctx = TestContext::new();
    let session = ctx.spawn_session(Some(""), None);
    let sink = session.sink.clone();

    let (_, phase) = session.finish().await;

    assert_eq!(phase, SessionPhase::Closed);
    assert!(sink.is_closed());
    assert!(ctx.state.registry.is_empty());
}

#[tokio::test]
async fn test_session_registers_and_joins_room() {
    let ctx = TestContext::new();
    let session = ctx.spawn_session(Some("alice"), Some("room1"));
    ctx.wait_registered("alice").await;

    assert_eq!(
        ctx.state.registry.lookup("alice").unwrap().session_id,
        session.session_id
    );
    assert_eq!(ctx.state.groups.members_of("room1").unwrap(), vec!["alice"]);
    assert_eq!(ctx.state.stats.get_total_sessions(), 1);

    let (result, phase) = session.finish().await;
    assert!(result.is_ok());
    assert_eq!(phase, SessionPhase::Closed);
    assert!(ctx.state.registry.lookup("alice").is_none());
}

#[tokio::test]
async fn test_frames_are_routed_between_sessions() {
    let ctx = TestContext::new();
    let alice = ctx.spawn_session(Some("alice"), None);
    let bob = ctx.spawn_session(Some("bob"), None);
    ctx.wait_registered("alice").await;
    ctx.wait_registered("bob").await;

    let frame = r#"{"type":"chat","message":"hi bob","user_ids":["bob"]}"#;
    alice.send(frame).await;

    let bob_sink = bob.sink.clone();
    wait_until(move || bob_sink.frame_count() == 1).await;
    assert_eq!(bob.sink.frames(), vec![frame.to_string()]);
    assert_eq!(alice.sink.frame_count(), 0);

    alice.finish().await;
    bob.finish().await;
}

#[tokio::test]
async fn test_room_members_receive_frames_in_order() {
    let ctx = TestContext::new();
    let alice = ctx.spawn_session(Some("alice"), Some("room1"));
    let bob = ctx.spawn_session(Some("bob"), Some("room1"));
    ctx.wait_registered("alice").await;
    ctx.wait_registered("bob").await;
    let state = ctx.state.clone();
    wait_until(move || state.groups.members_of("room1").is_some_and(|m| m.len() == 2)).await;

    let frames: Vec<String> = (0..5)
        .map(|i| format!(r#"{{"type":"chat","message":"{i}","room":"room1"}}"#))
        .collect();
    for frame in &frames {
        alice.send(frame).await;
    }

    let bob_sink = bob.sink.clone();
    wait_until(move || bob_sink.frame_count() == 5).await;
    assert_eq!(bob.sink.frames(), frames);
    // Self-echo is on by default.
    assert_eq!(alice.sink.frames(), frames);

    alice.finish().await;
    bob.finish().await;
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let ctx = TestContext::new();
    let alice = ctx.spawn_session(Some("alice"), None);
    let bob_sink = ctx.connect("bob");
    ctx.wait_registered("alice").await;

    alice.send("this is not json").await;
    alice
        .fail(RelayError::MalformedMessage("frame is not valid UTF-8".into()))
        .await;
    alice
        .send(r#"{"type":"chat","message":"still here","user_ids":["bob"]}"#)
        .await;

    let sink = bob_sink.clone();
    wait_until(move || sink.frame_count() == 1).await;
    assert!(ctx.state.registry.lookup("alice").is_some());
    assert_eq!(ctx.state.stats.get_total_frames(), 2);

    alice.finish().await;
}

#[tokio::test]
async fn test_read_error_ends_session_and_unregisters() {
    let ctx = TestContext::new();
    let alice = ctx.spawn_session(Some("alice"), None);
    ctx.wait_registered("alice").await;

    alice
        .fail(RelayError::Transport("connection reset".into()))
        .await;
    let state = ctx.state.clone();
    wait_until(move || state.registry.lookup("alice").is_none()).await;
    let sink = alice.sink.clone();
    let (result, phase) = alice.finish().await;

    assert!(result.is_ok());
    assert_eq!(phase, SessionPhase::Closed);
    assert!(sink.is_closed());

    let report = ctx
        .route_oneshot(r#"{"type":"chat","message":"x","user_ids":["alice"]}"#)
        .await;
    assert_eq!(report.attempted(), 0);
}

#[tokio::test]
async fn test_superseded_session_leaves_replacement_registered() {
    let ctx = TestContext::new();
    let first = ctx.spawn_session(Some("alice"), None);
    ctx.wait_registered("alice").await;
    let second = ctx.spawn_session(Some("alice"), None);
    let second_id = second.session_id;
    let state = ctx.state.clone();
    wait_until(move || {
        state
            .registry
            .lookup("alice")
            .is_some_and(|conn| conn.session_id == second_id)
    })
    .await;

    first.finish().await;

    let conn = ctx.state.registry.lookup("alice").expect("replacement must stay");
    assert_eq!(conn.session_id, second_id);

    second.finish().await;
    assert!(ctx.state.registry.lookup("alice").is_none());
}

#[tokio::test]
async fn test_session_ids_are_unique() {
    let ctx = TestContext::new();
    let a = ctx.spawn_session(Some("a"), None);
    let b = ctx.spawn_session(Some("b"), None);
    assert_ne!(a.session_id, b.session_id);
    a.finish().await;
    b.finish().await;
}
