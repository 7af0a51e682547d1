// src/server/context.rs

use crate::core::state::ServerState;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub router: Router,
    pub listener: TcpListener,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
    /// Present only in secured mode.
    pub acceptor: Option<TlsAcceptor>,
    /// Bounds the number of concurrently open TCP connections.
    pub connection_permits: Arc<Semaphore>,
}
