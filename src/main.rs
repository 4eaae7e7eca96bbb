//! Worker gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                    WORKER GATEWAY                    │
//!                         │                                                      │
//!   POST/GET /api/pcp     │  ┌─────────┐   ┌──────────┐   ┌──────────┐          │
//!   ──────────────────────┼─▶│ command │──▶│   auth   │──▶│ dispatch │──────────┼──▶ WorkerPool
//!                         │  │ parser  │   │   gate   │   │  router  │          │    (HTTP workers)
//!                         │  └─────────┘   └────┬─────┘   └────┬─────┘          │
//!                         │                     │ cookie       │ events         │
//!                         │                ┌────▼─────┐   ┌────▼─────┐          │
//!   envelope / stream     │                │ session  │   │  relay   │          │
//!   ◀─────────────────────┼────────────────│  codec   │   │ (stream) │          │
//!                         │                └────▲─────┘   └──────────┘          │
//!   GET login/callback    │  ┌─────────┐        │                               │
//!   ──────────────────────┼─▶│  oauth  │────────┘ Set-Cookie                    │
//!                         │  └─────────┘                                        │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use worker_gateway::config::load_config;
use worker_gateway::observability::{logging, metrics};
use worker_gateway::{GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "worker-gateway")]
#[command(about = "HTTP gateway in front of RPC worker services", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(&config.observability.log_level);
    tracing::info!(config = %cli.config.display(), "worker-gateway v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        workers = config.workers.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let bind_address = config.listener.bind_address.clone();
    let tls = config.listener.tls.is_some();
    let server = GatewayServer::from_config(config);

    if tls {
        let addr: SocketAddr = bind_address.parse()?;
        server.run_tls(addr, shutdown.subscribe()).await?;
    } else {
        let listener = TcpListener::bind(&bind_address).await?;
        server.run(listener, shutdown.subscribe()).await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
