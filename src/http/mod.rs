//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID + trace layers)
//!     → websocket.rs (origin check, auth, upstream dial, upgrade)
//!     → relay engine takes over the socket pair
//! ```

pub mod server;
pub mod websocket;

pub use server::{AppState, ProxyServer, ServerError};

/// Correlation header set on every request and echoed on the response.
pub const X_REQUEST_ID: &str = "x-request-id";
