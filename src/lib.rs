//! WebSocket reverse proxy with API-key authentication.
//!
//! Every admitted client connection is paired with its own connection to a
//! single configured upstream, and frames are relayed in both directions
//! until either side closes or the server shuts down.

pub mod config;
pub mod http;
pub mod keys;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
