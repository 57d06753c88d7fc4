//! WebSocket upgrade handling.
//!
//! # Responsibilities
//! - Check the `Origin` header against the allow-list
//! - Authenticate the API key
//! - Establish the dedicated upstream connection
//! - Complete the upgrade and hand the socket pair to the relay engine
//!
//! # Data Flow
//! ```text
//! Client ──upgrade──→ origin check ─→ auth ─→ dial upstream ─→ 101 ─→ RelayEngine
//!            │              │            │
//!            └──── 401 ─────┘            ├──── 503 (shutting down)
//!                                        └──── 500 (dial failed)
//! ```
//!
//! # Design Decisions
//! - The upstream is dialed before the 101 is sent, so a failed dial is a
//!   real 500 response and no session is ever registered for it
//! - Rejections carry only a status code and a short plain-text reason

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::http::server::AppState;
use crate::http::X_REQUEST_ID;
use crate::observability::metrics;
use crate::relay::{ProxySession, SessionId, SessionState};

/// Per-connection entry point bound to `/`.
pub async fn upgrade_handler(
    State(state): State<AppState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    uri: Uri,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let session_id = SessionId::new();
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(
        session_id = %session_id,
        request_id = %request_id,
        peer_addr = %peer_addr,
        state = ?SessionState::Authenticating,
        "Upgrade request received"
    );

    if !state.origins.check(&headers) {
        tracing::warn!(
            session_id = %session_id,
            request_id = %request_id,
            origin = ?headers.get(axum::http::header::ORIGIN),
            "Origin rejected"
        );
        metrics::record_admission(metrics::OUTCOME_ORIGIN_REJECTED);
        return (StatusCode::UNAUTHORIZED, "Origin not allowed").into_response();
    }

    if !state.auth.authenticate(&uri, &headers, &state.keys) {
        tracing::warn!(
            session_id = %session_id,
            request_id = %request_id,
            peer_addr = %peer_addr,
            "Invalid API key"
        );
        metrics::record_admission(metrics::OUTCOME_AUTH_REJECTED);
        return (StatusCode::UNAUTHORIZED, "Invalid key").into_response();
    }

    if state.engine.registry().is_shut_down() {
        tracing::info!(session_id = %session_id, request_id = %request_id, "Proxy shutting down, upgrade refused");
        metrics::record_admission(metrics::OUTCOME_SHUTTING_DOWN);
        return (StatusCode::SERVICE_UNAVAILABLE, "Proxy shutting down").into_response();
    }

    tracing::debug!(session_id = %session_id, state = ?SessionState::Dialing, "Dialing upstream");
    let upstream = match state.dialer.dial().await {
        Ok(socket) => socket,
        Err(e) => {
            tracing::error!(
                session_id = %session_id,
                request_id = %request_id,
                upstream = %state.dialer.url(),
                error = %e,
                "Upstream dial failed"
            );
            metrics::record_admission(metrics::OUTCOME_DIAL_FAILED);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Upstream connection failed").into_response();
        }
    };

    metrics::record_admission(metrics::OUTCOME_ADMITTED);
    let engine = Arc::clone(&state.engine);

    ws.on_failed_upgrade(move |e| {
        tracing::warn!(session_id = %session_id, error = %e, "Client upgrade failed");
    })
    .on_upgrade(move |socket| async move {
        engine
            .run(ProxySession::new(session_id, peer_addr, socket, upstream))
            .await;
    })
}
