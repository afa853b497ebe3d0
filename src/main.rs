//! Edge reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────┐
//!                      │                  EDGE PROXY                     │
//!   Client Request     │  ┌────────┐   ┌──────────┐   ┌─────────────┐   │
//!   ───────────────────┼─▶│  http  │──▶│ routing  │──▶│  security   │   │
//!                      │  │ server │   │  table   │   │ CORS, GCRA  │   │
//!                      │  └────────┘   └──────────┘   └──────┬──────┘   │
//!                      │                                     │  ▲       │
//!                      │                                     │  └───────┼──── Redis
//!                      │                                     ▼          │
//!   Client Response    │  ┌──────────────┐            ┌─────────────┐   │
//!   ◀──────────────────┼──│ interception │◀───────────│   forward   │◀──┼──── Upstream
//!                      │  │ cache, log,  │            │  (hyper)    │   │
//!                      │  │   metrics    │            └─────────────┘   │
//!                      │  └──────────────┘                              │
//!                      └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_proxy::config::{default_config, load_config};
use edge_proxy::observability::{logging, metrics};
use edge_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "edge-proxy")]
#[command(about = "Hostname-routing edge proxy with distributed rate limiting", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long, env = "EDGE_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    if cli.check {
        println!("configuration OK ({} routes)", config.routes.0.len());
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!("edge-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
