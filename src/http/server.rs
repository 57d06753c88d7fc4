//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Resolve auth strategy, key manager and origin allow-list from config
//! - Fetch API keys once, before any connection is accepted
//! - Create the Axum router with the upgrade handler and middleware
//! - Serve until shutdown, then close and drain every live session

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::any, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::validation::validate_config;
use crate::config::{ConfigError, ProxyConfig};
use crate::http::websocket::upgrade_handler;
use crate::keys::{KeyError, KeyManager, KeyStore};
use crate::lifecycle::shutdown::recv_shutdown;
use crate::relay::{DialError, RelayEngine, SessionRegistry, UpstreamDialer, UpstreamSocket};
use crate::security::auth::AuthStrategy;
use crate::security::origin::OriginGate;

/// Errors raised while building a [`ProxyServer`].
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("auth mode {auth:?} requires a key manager")]
    AuthWithoutKeyManager { auth: String },

    #[error("key manager {key_manager:?} is configured but auth is disabled")]
    KeyManagerWithoutAuth { key_manager: String },

    #[error(transparent)]
    KeyFetch(#[from] KeyError),

    #[error(transparent)]
    Dial(#[from] DialError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub origins: Arc<OriginGate>,
    pub auth: AuthStrategy,
    pub keys: Arc<KeyStore>,
    pub dialer: Arc<UpstreamDialer>,
    pub engine: Arc<RelayEngine>,
}

/// WebSocket reverse proxy for a single upstream.
#[derive(Clone)]
pub struct ProxyServer {
    state: AppState,
    drain_timeout: Duration,
}

impl ProxyServer {
    /// Build a server from configuration. Keys are loaded here, once.
    pub async fn new(config: &ProxyConfig) -> Result<Self, ServerError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let auth = AuthStrategy::from_mode(&config.auth.mode);
        let key_manager = KeyManager::from_config(&config.key_manager);

        let keys = match (auth.is_enabled(), key_manager.is_enabled()) {
            (true, true) => key_manager.fetch_keys().await?,
            (false, false) => KeyStore::default(),
            (true, false) => {
                return Err(ServerError::AuthWithoutKeyManager {
                    auth: config.auth.mode.clone(),
                })
            }
            (false, true) => {
                return Err(ServerError::KeyManagerWithoutAuth {
                    key_manager: config.key_manager.mode.clone(),
                })
            }
        };

        let dialer = UpstreamDialer::new(
            &config.upstream.url,
            &config.upstream.headers,
            config.timeouts.connect(),
        )?;
        let registry = Arc::new(SessionRegistry::new());
        let engine = RelayEngine::new(registry, config.timeouts.idle());

        tracing::info!(
            upstream = %dialer.url(),
            auth = ?auth,
            key_manager = %key_manager.identifier(),
            allowed_origins = config.auth.allowed_origins.len(),
            forwarded_headers = config.upstream.headers.len(),
            "Proxy configured"
        );

        Ok(Self {
            state: AppState {
                origins: Arc::new(OriginGate::new(config.auth.allowed_origins.clone())),
                auth,
                keys: Arc::new(keys),
                dialer: Arc::new(dialer),
                engine: Arc::new(engine),
            },
            drain_timeout: config.lifecycle.drain(),
        })
    }

    /// Unauthenticated proxy to `url` with every other setting defaulted.
    pub async fn simple(url: &str) -> Result<Self, ServerError> {
        let mut config = ProxyConfig::default();
        config.upstream.url = url.to_string();
        Self::new(&config).await
    }

    /// Router serving the upgrade endpoint at `/`.
    ///
    /// The handler extracts `ConnectInfo<SocketAddr>`, so this must be served
    /// through `into_make_service_with_connect_info::<SocketAddr>()`, as `run` does.
    pub(crate) fn router(&self) -> Router {
        Router::new()
            .route("/", any(upgrade_handler))
            .with_state(self.state.clone())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(self.state.engine.registry())
    }

    pub fn session_count(&self) -> usize {
        self.state.engine.registry().len()
    }

    /// Open a connection to the upstream outside of any session.
    pub async fn dial(&self) -> Result<UpstreamSocket, DialError> {
        self.state.dialer.dial().await
    }

    /// Close every live session. Returns how many were closed.
    ///
    /// The server keeps admitting new connections afterwards.
    pub fn close(&self) -> usize {
        self.state.engine.registry().close_all()
    }

    /// Block until `shutdown` fires, then stop admitting sessions and close
    /// every live one.
    pub async fn wait(&self, shutdown: broadcast::Receiver<()>) {
        recv_shutdown(shutdown).await;
        self.state.engine.registry().shut_down();
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, upstream = %self.state.dialer.url(), "Proxy listening");

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let server = self.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server.wait(shutdown).await })
            .await?;

        if !self.sessions().wait_until_empty(self.drain_timeout).await {
            tracing::warn!(
                remaining = self.session_count(),
                "Sessions still open after drain timeout"
            );
        }

        tracing::info!("Proxy stopped");
        Ok(())
    }
}
