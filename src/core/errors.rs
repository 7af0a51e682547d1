// src/core/errors.rs

//! Defines the primary error type for the relay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The main error enum, representing every steady-state failure in the relay.
///
/// Startup failures are reported through `anyhow` instead; nothing in here is
/// allowed to take the process down.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// A frame or request body that is not a valid message.
    #[error("{0}")]
    MalformedMessage(String),

    #[error("No user_ids provided")]
    NoRecipients,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The underlying websocket reported an error on read or write.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

// `std::io::Error` is not cloneable, so it is shared behind an Arc.
impl Clone for RelayError {
    fn clone(&self) -> Self {
        match self {
            RelayError::Io(e) => RelayError::Io(Arc::clone(e)),
            RelayError::MalformedMessage(s) => RelayError::MalformedMessage(s.clone()),
            RelayError::NoRecipients => RelayError::NoRecipients,
            RelayError::InvalidRequest(s) => RelayError::InvalidRequest(s.clone()),
            RelayError::Transport(s) => RelayError::Transport(s.clone()),
            RelayError::WriteTimeout(d) => RelayError::WriteTimeout(*d),
            RelayError::ConnectionClosed => RelayError::ConnectionClosed,
            RelayError::Internal(s) => RelayError::Internal(s.clone()),
        }
    }
}

impl PartialEq for RelayError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RelayError::Io(e1), RelayError::Io(e2)) => e1.to_string() == e2.to_string(),
            (RelayError::MalformedMessage(s1), RelayError::MalformedMessage(s2)) => s1 == s2,
            (RelayError::InvalidRequest(s1), RelayError::InvalidRequest(s2)) => s1 == s2,
            (RelayError::Transport(s1), RelayError::Transport(s2)) => s1 == s2,
            (RelayError::WriteTimeout(d1), RelayError::WriteTimeout(d2)) => d1 == d2,
            (RelayError::Internal(s1), RelayError::Internal(s2)) => s1 == s2,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl RelayError {
    /// True for errors caused by the caller's input rather than by the relay.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::MalformedMessage(_) | RelayError::NoRecipients | RelayError::InvalidRequest(_)
        )
    }

    fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::MalformedMessage(e.to_string())
    }
}

impl From<axum::Error> for RelayError {
    fn from(e: axum::Error) -> Self {
        RelayError::Transport(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for RelayError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        RelayError::MalformedMessage(format!("frame is not valid UTF-8: {e}"))
    }
}
