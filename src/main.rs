//! WebSocket Auth Proxy
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 WS AUTH PROXY                │
//!                        │                                              │
//!   Client upgrade       │  ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//!   ─────────────────────┼─▶│  origin  │──▶│   auth   │──▶│ upstream │──┼──▶ Upstream
//!                        │  │   gate   │   │ (keys)   │   │   dial   │  │    server
//!                        │  └──────────┘   └──────────┘   └────┬─────┘  │
//!                        │                                     │        │
//!   Client frames        │  ┌──────────────────────────────────▼─────┐  │
//!   ◀────────────────────┼─▶│ relay engine (two copy loops/session)  │◀─┼──▶
//!                        │  └────────────────────────────────────────┘  │
//!                        │                                              │
//!                        │  config · keys · lifecycle · observability   │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use ws_auth_proxy::config::{load_with_overrides, resolve_config_path, ConfigOverrides};
use ws_auth_proxy::lifecycle::{signals, startup, Shutdown};
use ws_auth_proxy::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "ws-auth-proxy", version, about = "WebSocket reverse proxy with API-key authentication")]
struct Cli {
    /// Path to a TOML config file. Defaults to ./config.toml when present.
    #[arg(short, long, env = "WS_PROXY_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config);
    let config = load_with_overrides(config_path.as_deref(), &cli.overrides)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ws-auth-proxy starting");

    tracing::info!(
        config_file = ?config_path,
        listen = %config.listener.socket_address(),
        upstream = %config.upstream.url,
        auth_mode = %config.auth.mode,
        key_manager = %config.key_manager.mode,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (server, listener) = startup::start(&config).await?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
