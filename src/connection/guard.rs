// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for registry cleanup.

use crate::core::metrics;
use crate::core::state::ServerState;
use std::sync::Arc;
use tracing::debug;

/// Removes a session's registry entry when the session ends, however it ends.
///
/// The removal is identity-checked: if a newer session has registered the
/// same user identifier in the meantime, that entry is left in place.
pub struct ConnectionGuard {
    /// A shared reference to the server state.
    pub(crate) state: Arc<ServerState>,
    pub(crate) user_id: String,
    pub(crate) session_id: u64,
}

impl ConnectionGuard {
    /// Creates a guard for a session that has just been registered.
    pub(crate) fn new(state: Arc<ServerState>, user_id: String, session_id: u64) -> Self {
        metrics::CONNECTED_CLIENTS.inc();
        Self {
            state,
            user_id,
            session_id,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::CONNECTED_CLIENTS.dec();
        if self
            .state
            .registry
            .unregister_session(&self.user_id, self.session_id)
        {
            debug!(
                "Unregistered user {} (session {}).",
                self.user_id, self.session_id
            );
        } else {
            debug!(
                "User {} (session {}) was already replaced in the registry; leaving the newer entry.",
                self.user_id, self.session_id
            );
        }
    }
}
