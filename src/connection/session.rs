// src/connection/session.rs

//! Defines the state associated with a single websocket session.

use serde::Deserialize;

/// Query parameters supplied on the websocket upgrade request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, alias = "group")]
    pub room_id: Option<String>,
}

impl ConnectParams {
    /// The user identifier, if one was supplied and is non-empty.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }

    /// The group to join, if one was supplied and is non-empty.
    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// The lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// The transport was upgraded; the session is not yet addressable.
    Connecting,
    /// The connection is in the registry and any requested group was joined.
    Registered,
    /// Frames are being read and dispatched one at a time.
    Reading,
    /// The connection was unregistered and the transport closed. Terminal.
    Closed,
}

/// One item read from the client side of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A data frame carrying message text.
    Frame(String),
    /// Ping, pong, or another frame with no routing content.
    Control,
    /// The peer asked to close the session.
    Close,
}
