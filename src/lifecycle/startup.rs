//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the server, which loads the API keys
//! - Optionally dial the upstream once so a dead backend fails startup
//! - Bind the listener last, so traffic only arrives when ready

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::http::{ProxyServer, ServerError};
use crate::relay::DialError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("upstream probe failed: {0}")]
    Probe(#[from] DialError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bring up a server and its listener from a validated config.
pub async fn start(config: &ProxyConfig) -> Result<(ProxyServer, TcpListener), StartupError> {
    let server = ProxyServer::new(config).await?;

    if config.lifecycle.probe_upstream {
        let mut probe = server.dial().await?;
        if let Err(e) = probe.close(None).await {
            tracing::debug!(error = %e, "Upstream probe close failed");
        }
        tracing::info!(upstream = %config.upstream.url, "Upstream reachable");
    }

    let addr = config.listener.socket_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr: addr.clone(), source })?;

    Ok((server, listener))
}
