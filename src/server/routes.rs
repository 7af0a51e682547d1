// src/server/routes.rs

//! The HTTP surface: websocket upgrade, one-shot send, and health.

use super::ingress;
use crate::connection::{ConnectParams, ConnectionHandler, WsSink, inbound_frames};
use crate::core::FrameSink;
use crate::core::state::ServerState;
use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
    routing::{get, post},
};
use futures::StreamExt;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, warn};

/// Builds the relay's router. Any origin may call it.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/send", post(ingress::send_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /ws?user_id=..&room_id=..`: upgrades and hands the socket to a session.
///
/// The upgrade happens even without a `user_id`; the session then closes
/// straight away.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    let max_frame_bytes = state.config.delivery.max_frame_bytes;
    ws.max_message_size(max_frame_bytes)
        .on_failed_upgrade(|e| warn!("Error upgrading connection: {}", e))
        .on_upgrade(move |socket| async move {
            let (tx, rx) = socket.split();
            let sink: Arc<dyn FrameSink> = Arc::new(WsSink::new(tx));
            let mut handler = ConnectionHandler::new(inbound_frames(rx), sink, state, params);
            debug!("Websocket upgraded for session {}.", handler.session_id());
            if let Err(e) = handler.run().await {
                warn!(
                    "Session {} terminated unexpectedly: {}",
                    handler.session_id(),
                    e
                );
            }
        })
}

/// `GET /health`: liveness plus a snapshot of the stores and counters.
async fn health_handler(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "connections": state.registry.len(),
        "groups": state.groups.group_count(),
        "memberships": state.groups.membership_count(),
        "total_sessions": state.stats.get_total_sessions(),
        "total_frames": state.stats.get_total_frames(),
        "total_oneshot_requests": state.stats.get_total_oneshot_requests(),
    }))
}
