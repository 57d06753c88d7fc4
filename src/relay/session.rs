//! Session identity, state and the paired socket bundle.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracing
//! - Track session state (Created → Authenticating → Dialing → Relaying → Closed)
//! - Give the registry a cheap, idempotent way to close a session

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::WebSocket;
use tokio::sync::watch;

use crate::relay::upstream::UpstreamSocket;

/// Global atomic counter for session IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a proxied session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle of one inbound connection. No state is re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upgrade request received.
    Created,
    /// Origin and API key being checked.
    Authenticating,
    /// Connecting to the upstream.
    Dialing,
    /// Both relay directions running.
    Relaying,
    /// Both sockets closed (or being closed).
    Closed,
}

impl SessionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

/// Registry-side handle for a live session.
///
/// Cloning is cheap; every clone refers to the same session. Closing moves
/// the session to [`SessionState::Closed`], which both relay loops observe.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    peer_addr: SocketAddr,
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionHandle {
    /// Create a handle in the `Relaying` state plus a receiver for the relay loops.
    pub fn new(id: SessionId, peer_addr: SocketAddr) -> (Self, watch::Receiver<SessionState>) {
        let (tx, rx) = watch::channel(SessionState::Relaying);
        (
            Self {
                id,
                peer_addr,
                state: Arc::new(tx),
            },
            rx,
        )
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Request teardown. Returns false if the session was already closed.
    pub fn close(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_closed() {
                false
            } else {
                *state = SessionState::Closed;
                true
            }
        })
    }
}

/// One admitted connection: the client socket and its dedicated upstream socket.
pub struct ProxySession {
    pub id: SessionId,
    pub peer_addr: SocketAddr,
    pub downstream: WebSocket,
    pub upstream: UpstreamSocket,
}

impl ProxySession {
    pub fn new(id: SessionId, peer_addr: SocketAddr, downstream: WebSocket, upstream: UpstreamSocket) -> Self {
        Self {
            id,
            peer_addr,
            downstream,
            upstream,
        }
    }
}
