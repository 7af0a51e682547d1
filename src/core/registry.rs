// src/core/registry.rs

//! The connection registry: which user identifier is reachable through which
//! live connection.

use super::errors::RelayError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The outbound half of a live connection.
///
/// Implementations must make `send_text` safe to call from many tasks at once;
/// each call writes exactly one frame.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Writes `payload` to the peer as one text frame.
    async fn send_text(&self, payload: Arc<str>) -> Result<(), RelayError>;

    /// Closes the underlying transport. Errors are swallowed; the peer may
    /// already be gone.
    async fn close(&self);
}

/// A live, addressable connection tied to one user identifier.
pub struct Connection {
    pub session_id: u64,
    pub user_id: String,
    pub connected_at: Instant,
    sink: Arc<dyn FrameSink>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn new(session_id: u64, user_id: impl Into<String>, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            session_id,
            user_id: user_id.into(),
            connected_at: Instant::now(),
            sink,
        }
    }

    pub async fn send_text(&self, payload: Arc<str>) -> Result<(), RelayError> {
        self.sink.send_text(payload).await
    }

    pub async fn close(&self) {
        self.sink.close().await
    }
}

/// Maps user identifiers to their live connection.
///
/// At most one connection is kept per identifier; registering again replaces
/// the previous entry without notifying it.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts or replaces the entry for the connection's user identifier.
    pub fn register(&self, connection: Arc<Connection>) {
        let user_id = connection.user_id.clone();
        let session_id = connection.session_id;
        if let Some(previous) = self.connections.insert(user_id.clone(), connection) {
            info!(
                "User {} re-registered: session {} replaces session {}.",
                user_id, session_id, previous.session_id
            );
        } else {
            debug!("User {} registered with session {}.", user_id, session_id);
        }
    }

    /// Removes the entry for `user_id`, whichever connection holds it.
    /// Returns false if nothing was registered.
    pub fn unregister(&self, user_id: &str) -> bool {
        self.connections.remove(user_id).is_some()
    }

    /// Removes the entry for `user_id` only if it still belongs to `session_id`.
    ///
    /// A session that was superseded by a newer connection for the same user
    /// must not evict its replacement when it closes.
    pub fn unregister_session(&self, user_id: &str, session_id: u64) -> bool {
        self.connections
            .remove_if(user_id, |_, conn| conn.session_id == session_id)
            .is_some()
    }

    /// Returns a snapshot of the connection for `user_id`, if one is live.
    pub fn lookup(&self, user_id: &str) -> Option<Arc<Connection>> {
        self.connections.get(user_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
