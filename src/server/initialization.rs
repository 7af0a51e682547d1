// src/server/initialization.rs

//! Handles the complete server initialization process: credential loading,
//! state setup, and binding the listener.

use super::context::ServerContext;
use super::routes::build_router;
use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::{Result, anyhow};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_rustls::{TlsAcceptor, rustls};
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    // Secured mode must fail here, before anything is bound.
    let acceptor = setup_tls(&config)?;

    let state = ServerState::new(config);
    info!("Server state initialized.");

    let listener = TcpListener::bind((state.config.host.as_str(), state.config.port)).await?;
    let scheme = if acceptor.is_some() { "https" } else { "http" };
    info!(
        "wsrelay listening on {}://{}:{}",
        scheme, state.config.host, state.config.port
    );
    let connection_permits = Arc::new(Semaphore::new(state.config.max_clients));
    let router = build_router(state.clone());

    Ok(ServerContext {
        state,
        router,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        acceptor,
        connection_permits,
    })
}

/// Sets up the TLS acceptor if the server runs in secured mode.
pub(crate) fn setup_tls(config: &Config) -> Result<Option<TlsAcceptor>> {
    if config.is_secured() {
        info!("Secured mode: loading certificate and key.");
        let certs = load_certs(&config.tls.cert_path)?;
        let key = load_key(&config.tls.key_path)?;
        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        Ok(Some(TlsAcceptor::from(Arc::new(server_config))))
    } else {
        Ok(None)
    }
}

/// Loads TLS certificates from a PEM file.
fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let cert_file = File::open(path)
        .map_err(|e| anyhow!("Error reading cert file '{}': {}", path, e))?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(anyhow!("No certificates found in '{}'", path));
    }
    Ok(certs)
}

/// Loads a private key from a PEM file.
fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let key_file = File::open(path)
        .map_err(|e| anyhow!("Error reading key file '{}': {}", path, e))?;
    let mut key_reader = BufReader::new(key_file);
    rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| anyhow!("No private key found in key file '{}'", path))
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Server mode: {:?}, max clients: {}.",
        config.server_mode, config.max_clients
    );
    match config.delivery.write_timeout_ms {
        0 => warn!("Peer writes are unbounded: a stalled recipient delays every fan-out addressing it."),
        ms => info!("Peer writes time out after {} ms.", ms),
    }
    if !config.delivery.echo_to_sender {
        info!("Self-echo is disabled: senders never receive their own messages.");
    }
}
