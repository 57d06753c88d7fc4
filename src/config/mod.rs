//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → overrides.rs (CLI flags / WS_PROXY_* env vars)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to ProxyServer at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod overrides;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_with_overrides, resolve_config_path, ConfigError};
pub use overrides::ConfigOverrides;
pub use schema::{
    AuthConfig, KeyManagerConfig, ListenerConfig, ProxyConfig, SecretsConfig, TimeoutConfig,
    UpstreamConfig,
};
