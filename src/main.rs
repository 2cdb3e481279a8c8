//! Endpoint guard server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ authentication ─▶ session ─▶ dispatch
//!                                   (bearer token)    (cookie)      │
//!                                                                    ▼
//!                                                        ┌───────────────────┐
//!                                                        │  EndpointRegistry │
//!                                                        │  lookup           │
//!                                                        └─────────┬─────────┘
//!                                                                  ▼
//!                                                        ┌───────────────────┐
//!                                                        │  AccessChecker    │
//!                                                        │  target + csrf +  │
//!                                                        │  marker precedence│
//!                                                        └─────────┬─────────┘
//!     Client Response                                              │
//!     ◀────────────── 200 handler result | 401 / 403 denial ◀──────┘
//! ```
//!
//! Endpoints declared in the config file are served with an echo handler.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use endpoint_guard::config::{load_config, GuardConfig};
use endpoint_guard::endpoint::{echo_handler, EndpointRegistry};
use endpoint_guard::http::GuardServer;
use endpoint_guard::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "endpoint-guard")]
#[command(about = "Serve endpoint methods behind role-based access checks", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;

    tracing::info!("endpoint-guard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        endpoints = config.endpoints.len(),
        users = config.users.len(),
        csrf_enabled = config.security.csrf_enabled,
        deployment_mode = ?config.security.deployment_mode,
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let registry = EndpointRegistry::from_config(&config.endpoints, echo_handler());
    let server = GuardServer::new(config, registry);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
