// tests/integration/registry_test.rs

//! Integration tests for the connection registry

use super::test_helpers::{RecordingSink, TestContext};
use std::sync::Arc;
use wsrelay::core::{Connection, ConnectionRegistry};

#[test]
fn test_register_and_lookup() {
    let registry = ConnectionRegistry::new();
    assert!(registry.is_empty());

    registry.register(Arc::new(Connection::new(
        1,
        "alice",
        Arc::new(RecordingSink::default()),
    )));

    let conn = registry.lookup("alice").expect("alice should be registered");
    assert_eq!(conn.user_id, "alice");
    assert_eq!(conn.session_id, 1);
    assert!(registry.lookup("alice").is_some());
    assert!(registry.lookup("bob").is_none());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_register_replaces_previous_entry() {
    let registry = ConnectionRegistry::new();
    registry.register(Arc::new(Connection::new(1, "alice", Arc::new(RecordingSink::default()))));
    registry.register(Arc::new(Connection::new(2, "alice", Arc::new(RecordingSink::default()))));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.lookup("alice").unwrap().session_id, 2);
}

#[test]
fn test_unregister_absent_is_noop() {
    let registry = ConnectionRegistry::new();
    assert!(!registry.unregister("ghost"));
    assert!(registry.is_empty());
}

#[test]
fn test_unregister_removes_entry() {
    let registry = ConnectionRegistry::new();
    registry.register(Arc::new(Connection::new(1, "alice", Arc::new(RecordingSink::default()))));

    assert!(registry.unregister("alice"));
    assert!(registry.lookup("alice").is_none());
    assert!(!registry.unregister("alice"));
}

#[test]
fn test_unregister_session_keeps_newer_connection() {
    let registry = ConnectionRegistry::new();
    registry.register(Arc::new(Connection::new(1, "alice", Arc::new(RecordingSink::default()))));
    registry.register(Arc::new(Connection::new(2, "alice", Arc::new(RecordingSink::default()))));

    // The superseded session cleans up after itself.
    assert!(!registry.unregister_session("alice", 1));
    assert_eq!(registry.lookup("alice").unwrap().session_id, 2);

    assert!(registry.unregister_session("alice", 2));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_replaced_connection_no_longer_receives() {
    let ctx = TestContext::new();
    let old = ctx.connect("alice");
    let new = ctx.connect("alice");

    let report = ctx
        .route_oneshot(r#"{"type":"chat","message":"hi","user_ids":["alice"]}"#)
        .await;

    assert_eq!(report.delivered, 1);
    assert_eq!(old.frame_count(), 0);
    assert_eq!(new.frame_count(), 1);
}

#[tokio::test]
async fn test_concurrent_registrations() {
    let ctx = TestContext::new();
    let mut handles = Vec::new();
    for i in 0..64 {
        let state = ctx.state.clone();
        handles.push(tokio::spawn(async move {
            let user_id = format!("user-{i}");
            let session_id = state.next_session_id();
            state.registry.register(Arc::new(Connection::new(
                session_id,
                user_id.clone(),
                Arc::new(RecordingSink::default()),
            )));
            if i % 2 == 0 {
                state.registry.unregister(&user_id);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(ctx.state.registry.len(), 32);
    assert!(ctx.state.registry.lookup("user-1").is_some());
    assert!(ctx.state.registry.lookup("user-0").is_none());
}
