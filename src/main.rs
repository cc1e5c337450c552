//! Idempotency gateway.
//!
//! A reverse proxy that fronts one upstream service and replays stored responses
//! for repeated POST, PUT and PATCH requests carrying the same idempotency key.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request       ┌──────────────────────────────────────────────┐
//!     ─────────────────────┼─▶ request id → trace → timeout               │
//!                          │        │                                     │
//!                          │        ▼                                     │
//!                          │   interceptor ── hit ──▶ stored response     │
//!                          │        │ miss                                │
//!                          │        ▼                                     │
//!                          │   forward ───────────────────────────────────┼──▶ Upstream
//!                          │        │                                     │
//!                          │        ▼                                     │
//!                          │   store snapshot (ttl)                       │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use idempotency_gateway::config::{load_config, watcher::ConfigWatcher, ConfigHandle, GatewayConfig};
use idempotency_gateway::http::GatewayServer;
use idempotency_gateway::idempotency::StoreRegistry;
use idempotency_gateway::lifecycle::Shutdown;
use idempotency_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "idempotency-gateway")]
#[command(about = "Reverse proxy that replays responses for repeated idempotency keys", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "IDEMPOTENCY_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Watch the configuration file and apply changes without restarting.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("idempotency-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        header = %config.idempotency.header,
        store = %config.idempotency.cache.store,
        ttl_minutes = config.idempotency.cache.ttl,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let stores = Arc::new(StoreRegistry::from_config(&config.stores)?);
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let handle = ConfigHandle::new(config);

    // The watcher stops delivering updates once dropped, so it lives until main returns.
    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => (None, mpsc::unbounded_channel().1),
    };

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = GatewayServer::new(handle, stores);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
