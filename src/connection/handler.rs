// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a websocket session.

use super::guard::ConnectionGuard;
use super::session::{ConnectParams, Inbound, SessionPhase};
use crate::core::metrics;
use crate::core::state::ServerState;
use crate::core::{Connection, FrameSink, Message, Origin, RelayError};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives one session from registration to close.
///
/// The handler is generic over the inbound stream so the same loop runs on an
/// upgraded websocket and on an in-memory stream.
pub struct ConnectionHandler<S> {
    frames: S,
    sink: Arc<dyn FrameSink>,
    state: Arc<ServerState>,
    session_id: u64,
    params: ConnectParams,
    phase: SessionPhase,
}

impl<S> ConnectionHandler<S>
where
    S: Stream<Item = Result<Inbound, RelayError>> + Unpin,
{
    /// Creates a handler for a freshly upgraded transport.
    pub fn new(
        frames: S,
        sink: Arc<dyn FrameSink>,
        state: Arc<ServerState>,
        params: ConnectParams,
    ) -> Self {
        let session_id = state.next_session_id();
        Self {
            frames,
            sink,
            state,
            session_id,
            params,
            phase: SessionPhase::Connecting,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Runs the session until the peer disconnects or a read fails.
    ///
    /// Each frame is routed to completion before the next one is read, so one
    /// session never has more than one fan-out in flight.
    pub async fn run(&mut self) -> Result<(), RelayError> {
        let Some(user_id) = self.params.user_id().map(str::to_owned) else {
            warn!(
                "User ID is required; closing session {}.",
                self.session_id
            );
            metrics::SESSIONS_REJECTED_TOTAL.inc();
            self.close().await;
            return Ok(());
        };

        let connection = Arc::new(Connection::new(
            self.session_id,
            user_id.clone(),
            self.sink.clone(),
        ));
        self.state.registry.register(connection);
        let guard = ConnectionGuard::new(self.state.clone(), user_id.clone(), self.session_id);
        self.state.stats.increment_total_sessions();
        info!("User {} connected (session {}).", user_id, self.session_id);
        self.transition(SessionPhase::Registered);

        if let Some(room_id) = self.params.room_id() {
            self.state.groups.join(room_id, &user_id);
            metrics::GROUP_JOINS_TOTAL.inc();
            info!("User {} joined room {}.", user_id, room_id);
        }
        self.transition(SessionPhase::Reading);

        loop {
            match self.frames.next().await {
                Some(Ok(Inbound::Frame(text))) => {
                    process_frame(&self.state, self.session_id, &user_id, &text).await
                }
                Some(Ok(Inbound::Control)) => {}
                Some(Ok(Inbound::Close)) | None => {
                    debug!("Session {} for user {} closed by peer.", self.session_id, user_id);
                    break;
                }
                // An undecodable frame is skipped; the session stays open.
                Some(Err(RelayError::MalformedMessage(e))) => {
                    warn!("Skipping malformed frame from user {}: {}", user_id, e);
                    metrics::MALFORMED_FRAMES_TOTAL.inc();
                }
                Some(Err(e)) => {
                    warn!("Error reading message from user {}: {}", user_id, e);
                    break;
                }
            }
        }

        // Unregister before closing so no fan-out picks up a closing transport.
        drop(guard);
        self.close().await;
        info!("User {} disconnected (session {}).", user_id, self.session_id);
        Ok(())
    }

    async fn close(&mut self) {
        self.sink.close().await;
        self.transition(SessionPhase::Closed);
    }

    fn transition(&mut self, next: SessionPhase) {
        debug!(
            "Session {}: {:?} -> {:?}",
            self.session_id, self.phase, next
        );
        self.phase = next;
    }
}

/// Decodes one frame and routes it. The frame text is forwarded verbatim.
async fn process_frame(state: &ServerState, session_id: u64, user_id: &str, text: &str) {
    state.stats.increment_total_frames();
    metrics::FRAMES_RECEIVED_TOTAL.inc();

    let message = match Message::parse(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Error unmarshalling message from user {}: {}", user_id, e);
            metrics::MALFORMED_FRAMES_TOTAL.inc();
            return;
        }
    };

    let report = state
        .dispatcher()
        .route(&message, text, Origin::Session(user_id))
        .await;
    debug!(
        "Session {}: routed '{}' frame to {} of {} recipients.",
        session_id,
        message.kind,
        report.delivered,
        report.resolved
    );
}
