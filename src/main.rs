//! connhub server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                   SERVER                      │
//!   Client stream     │  ┌──────────┐   ┌────────────┐   ┌─────────┐  │
//!   ──────────────────┼─▶│ listener │──▶│ accept loop│──▶│ handler │  │
//!                     │  └──────────┘   └─────┬──────┘   │  task   │  │
//!                     │                       │          └────┬────┘  │
//!                     │                       ▼               │       │
//!                     │                ┌────────────┐         │       │
//!                     │                │  registry  │◀────────┘       │
//!                     │                └────────────┘  close          │
//!                     │                                               │
//!                     │  root scope ──cancel──▶ every connection scope│
//!                     └──────────────────────────────────────────────┘
//! ```
//!
//! Runs the built-in echo handler. Stops on SIGINT/SIGTERM, then drains.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use connhub::config::{load_with_overrides, ListenerOverrides, Network, ServerConfig};
use connhub::lifecycle::wait_for_shutdown;
use connhub::observability::{logging, metrics};
use connhub::{EchoHandler, Server};

#[derive(Parser)]
#[command(name = "connhub")]
#[command(about = "Supervised TCP / Unix stream server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network kind, overrides the config file ("tcp" or "unix")
    #[arg(short, long)]
    network: Option<Network>,

    /// Bind address, overrides the config file
    #[arg(short, long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = ListenerOverrides {
        network: cli.network,
        address: cli.address,
    };
    let config = load_with_overrides(cli.config.as_deref(), overrides)?;

    logging::init(&config.observability.log_level, config.observability.log_format)?;
    tracing::info!("connhub v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server_config = ServerConfig::from_app_config(&config)?;
    tracing::info!(
        network = %server_config.network(),
        address = %server_config.address(),
        retry_transient = server_config.accept().retry_transient,
        "Configuration loaded"
    );

    let server = Arc::new(Server::new(server_config, EchoHandler));
    let mut accept_loop = server.spawn();

    let outcome = tokio::select! {
        res = &mut accept_loop => res?,
        _ = wait_for_shutdown() => {
            server.stop();
            accept_loop.await?
        }
    };

    let drain_timeout = Duration::from_secs(config.shutdown.drain_timeout_secs);
    if server.drain(drain_timeout).await {
        tracing::info!("Shutdown complete");
    }

    outcome.map_err(Into::into)
}
