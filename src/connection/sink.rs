// src/connection/sink.rs

//! Adapts an axum websocket to the relay's `FrameSink` and inbound stream types.

use super::session::Inbound;
use crate::core::{FrameSink, RelayError};
use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// The write half of a websocket.
///
/// Writes from concurrent fan-outs are serialized by the mutex, so frames to
/// one peer never interleave.
pub struct WsSink {
    inner: Mutex<SplitSink<WebSocket, WsMessage>>,
}

impl WsSink {
    pub fn new(inner: SplitSink<WebSocket, WsMessage>) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&self, payload: Arc<str>) -> Result<(), RelayError> {
        let mut sink = self.inner.lock().await;
        sink.send(WsMessage::Text(payload.as_ref().into())).await?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.inner.lock().await.close().await {
            debug!("Error while closing websocket: {}", e);
        }
    }
}

/// Maps the read half of a websocket onto `Inbound` items.
///
/// Binary frames are accepted when they hold UTF-8 text; anything else
/// surfaces as a malformed-frame error, which the session skips.
pub fn inbound_frames(
    stream: SplitStream<WebSocket>,
) -> impl Stream<Item = Result<Inbound, RelayError>> + Send + Unpin {
    stream.map(|item| match item {
        Ok(WsMessage::Text(text)) => Ok(Inbound::Frame(text.as_str().to_owned())),
        Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Ok(Inbound::Frame(text)),
            Err(e) => Err(RelayError::from(e)),
        },
        Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => Ok(Inbound::Control),
        Ok(WsMessage::Close(_)) => Ok(Inbound::Close),
        Err(e) => Err(RelayError::from(e)),
    })
}
