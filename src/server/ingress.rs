// src/server/ingress.rs

//! The one-shot ingress: a single POST that delivers one message to an
//! explicit recipient list.

use crate::core::metrics;
use crate::core::state::ServerState;
use crate::core::{Message, RelayError};
use axum::extract::State;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// `POST /send`: decodes the body and routes it to `user_ids`.
///
/// Groups are never resolved on this path. Zero deliveries is still a success.
pub async fn send_handler(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<String, RelayError> {
    state.stats.increment_total_oneshot_requests();
    match deliver(&state, &body).await {
        Ok(attempted) => {
            metrics::ONESHOT_REQUESTS_TOTAL
                .with_label_values(&["ok"])
                .inc();
            Ok(format!("Message sent to {attempted} clients"))
        }
        Err(e) => {
            metrics::ONESHOT_REQUESTS_TOTAL
                .with_label_values(&["rejected"])
                .inc();
            warn!("Rejected one-shot send: {}", e);
            Err(e)
        }
    }
}

async fn deliver(state: &ServerState, body: &[u8]) -> Result<usize, RelayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(RelayError::InvalidRequest("empty request body".into()));
    }
    let message = Message::from_slice(body)?;
    if message.user_ids.is_empty() {
        return Err(RelayError::NoRecipients);
    }

    let payload = message.to_json()?;
    let report = state.dispatcher().route_direct(&message, &payload).await;
    debug!(
        "One-shot send: {} addressed, {} attempted, {} offline.",
        report.resolved,
        report.attempted(),
        report.offline
    );
    Ok(report.attempted())
}
