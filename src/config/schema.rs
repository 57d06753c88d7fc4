//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the authenticating WebSocket proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, port).
    pub listener: ListenerConfig,

    /// The single backend every session is relayed to.
    pub upstream: UpstreamConfig,

    /// Admission settings (auth mode, origin allow-list).
    pub auth: AuthConfig,

    /// Where valid API keys come from.
    pub key_manager: KeyManagerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Startup and shutdown behaviour.
    pub lifecycle: LifecycleConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address without port (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Listen port.
    pub port: u16,
}

impl ListenerConfig {
    /// Full `host:port` string suitable for binding.
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Upstream (backend) WebSocket server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// WebSocket URL of the backend (`ws://` or `wss://`).
    pub url: String,

    /// Extra headers sent on every upstream dial.
    pub headers: BTreeMap<String, String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000".to_string(),
            headers: BTreeMap::new(),
        }
    }
}

/// Admission configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Where the API key is read from: "param", "header", or empty to disable.
    pub mode: String,

    /// Exact `Origin` values that may connect. Empty allows every origin.
    pub allowed_origins: Vec<String>,
}

/// Key manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KeyManagerConfig {
    /// Backing store: "file", "secrets-backend", or empty to disable.
    pub mode: String,

    /// File path or secret id, depending on `mode`.
    pub identifier: String,

    /// Client settings for the secrets backend.
    pub secrets: SecretsConfig,
}

/// AWS Secrets Manager client settings.
///
/// Every field is optional; unset fields fall back to the default AWS
/// provider chain (environment, profile, instance metadata).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecretsConfig {
    pub region: Option<String>,
    /// Override endpoint, e.g. a LocalStack instance.
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Timeout configuration for upstream connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Ceiling for a single relay read or write in seconds (default one week).
    pub idle_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            idle_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Startup and shutdown settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Dial the upstream once at startup and refuse to start if it fails.
    pub probe_upstream: bool,

    /// How long to wait for closed sessions to finish tearing down on shutdown.
    pub drain_secs: u64,
}

impl LifecycleConfig {
    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            probe_upstream: true,
            drain_secs: 10,
        }
    }
}
