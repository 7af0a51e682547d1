// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling shutdown.

use super::context::ServerContext;
use crate::core::metrics;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tower::Service;
use tracing::{debug, error, info, warn};

/// The main server loop that accepts connections until a shutdown signal arrives.
///
/// Shutdown does not drain sessions: open connections are aborted.
pub async fn run(mut ctx: ServerContext) {
    let mut client_tasks = JoinSet::new();

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to register signal handlers: {}", e);
            return;
        }
    };

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, shutting down.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        metrics::CONNECTIONS_RECEIVED_TOTAL.inc();
                        let Ok(permit) = ctx.connection_permits.clone().try_acquire_owned() else {
                            warn!("Rejecting connection from {}: max_clients reached.", addr);
                            continue;
                        };
                        debug!("Accepted new connection from: {}", addr);

                        let router = ctx.router.clone();
                        if let Some(acceptor) = ctx.acceptor.clone() {
                            client_tasks.spawn(async move {
                                match acceptor.accept(socket).await {
                                    Ok(tls_stream) => {
                                        debug!("TLS handshake successful for {addr}");
                                        serve_connection(tls_stream, router, addr).await;
                                    }
                                    Err(e) => warn!("TLS handshake error for {addr}: {e}"),
                                }
                                drop(permit);
                            });
                        } else {
                            client_tasks.spawn(async move {
                                serve_connection(socket, router, addr).await;
                                drop(permit);
                            });
                        }
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!("A client handler panicked: {e:?}");
                    }
                }
            },
        }
    }

    info!("Shutting down. Sending signal to all tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("No background task was listening for the shutdown signal.");
    }

    client_tasks.shutdown().await;
    info!("All client connections closed.");

    if tokio::time::timeout(Duration::from_secs(5), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };
    info!("Server shutdown complete.");
}

/// Serves HTTP (with websocket upgrades) on one accepted stream, plain or TLS.
async fn serve_connection<S>(stream: S, router: Router, addr: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = hyper::service::service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
        let mut router = router.clone();
        async move { router.call(req.map(axum::body::Body::new)).await }
    });
    let builder = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
    if let Err(e) = builder.serve_connection_with_upgrades(io, service).await {
        debug!("Connection error from {addr}: {e}");
    }
}
