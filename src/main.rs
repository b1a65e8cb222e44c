//! relay-gateway
//!
//! ```text
//!     Client ──▶ http::server ──▶ routing ──▶ upstream ──▶ Backend
//!                    │               │           │
//!                    │          RouteTable   transform chain
//!                    │          (ArcSwap)    + client registry
//!                    ◀──────── response transforms / translation ◀──
//! ```
//!
//! Configuration is read from the file given with `--config` (defaults otherwise)
//! and reloaded when that file changes.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use relay_gateway::config::{load_config, ConfigWatcher, GatewayConfig};
use relay_gateway::observability::{logging, metrics};
use relay_gateway::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "relay-gateway", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "RELAY_GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "relay-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The watcher stops when its handle is dropped, so it lives until main returns.
    let (config_updates, _watch_handle) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (rx, Some(watcher.run()?))
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server
        .run(listener, config_updates, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
