//! Command-line and environment overrides.
//!
//! Each flag can also be supplied through a `WS_PROXY_*` environment
//! variable. Anything left unset keeps the value from the file or default.

use clap::Args;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Port to listen on.
    #[arg(long, env = "WS_PROXY_PORT")]
    pub port: Option<u16>,

    /// Upstream WebSocket URL.
    #[arg(long, env = "WS_PROXY_UPSTREAM")]
    pub upstream: Option<String>,

    /// Authentication mode: param or header.
    #[arg(long, env = "WS_PROXY_AUTH_MODE")]
    pub auth_mode: Option<String>,

    /// Key manager mode: file or secrets-backend.
    #[arg(long, env = "WS_PROXY_KEY_MANAGER")]
    pub key_manager: Option<String>,

    /// Key file path or secret id.
    #[arg(long, env = "WS_PROXY_KEY_IDENTIFIER")]
    pub key_identifier: Option<String>,

    /// Allowed Origin value; repeat the flag for more than one.
    #[arg(long = "allowed-origin", env = "WS_PROXY_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "WS_PROXY_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    /// Write every set override into `config`.
    pub fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(url) = &self.upstream {
            config.upstream.url = url.clone();
        }
        if let Some(mode) = &self.auth_mode {
            config.auth.mode = mode.clone();
        }
        if let Some(mode) = &self.key_manager {
            config.key_manager.mode = mode.clone();
        }
        if let Some(identifier) = &self.key_identifier {
            config.key_manager.identifier = identifier.clone();
        }
        if !self.allowed_origins.is_empty() {
            config.auth.allowed_origins = self.allowed_origins.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}
