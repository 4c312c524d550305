//! Caching Forward HTTP Proxy
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                 FORWARD PROXY                     │
//!                    │                                                   │
//!   Client Request   │  ┌─────────┐   ┌─────────┐   ┌──────────────┐   │
//!   ─────────────────┼─▶│   net   │──▶│  http   │──▶│ domain filter │   │
//!                    │  │listener │   │ parser  │   └──────┬───────┘   │
//!                    │  └─────────┘   └─────────┘          │            │
//!                    │                                      ▼            │
//!                    │                              ┌──────────────┐    │
//!                    │                              │ cache lookup │    │
//!                    │                              └──────┬───────┘    │
//!                    │                              miss / stale        │
//!   Client Response  │  ┌─────────┐   ┌─────────┐          ▼            │
//!   ◀────────────────┼──│response │◀──│ origin  │◀── conditional GET ───┼──── Origin
//!                    │  │ writer  │   │ fetcher │                       │     Server
//!                    │  └─────────┘   └─────────┘                       │
//!                    │                                                   │
//!                    │  config · observability (tracing, metrics)        │
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forward_proxy::config::loader::load_config;
use forward_proxy::config::ProxyConfig;
use forward_proxy::http::ProxyServer;
use forward_proxy::observability::metrics;

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Caching forward HTTP proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port override.
    #[arg(short, long)]
    port: Option<u16>,

    /// Blocklist file override (one host substring per line).
    #[arg(short, long)]
    blocklist: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(path) = &cli.blocklist {
        config.filter.blocklist_path = Some(path.display().to_string());
    }

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("forward_proxy={}", config.observability.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("forward-proxy v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        port = config.listener.port,
        cache_ttl_secs = config.cache.ttl_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let server = ProxyServer::new(config.clone());

    if config.filter.blocklist_path.is_some() {
        match server.reload_blocklist() {
            Ok(count) => tracing::info!(entries = count, "Domain filter ready"),
            Err(e) => tracing::error!(error = %e, "Error loading filtered domains"),
        }
    }

    server.start(config.listener.port).await?;

    // Unrecoverable bind failure aborts above; from here the proxy runs
    // until the process is terminated.
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    server.stop();

    tracing::info!("Shutdown complete");
    Ok(())
}
