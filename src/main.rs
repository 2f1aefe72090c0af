//! Vault Gateway (v1)
//!
//! Holds one signing key per user and signs chain transactions on their behalf.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  VAULT GATEWAY                    │
//!                         │                                                   │
//!     JSON-RPC call       │  ┌─────────┐    ┌──────────┐    ┌────────────┐   │
//!     ────────────────────┼─▶│  http   │───▶│ gateway  │───▶│   vault    │   │
//!     (X-Auth-User)       │  │ server  │    │ handler  │    │ get/create │   │
//!                         │  └─────────┘    └────┬─────┘    └────────────┘   │
//!                         │                      │                            │
//!                         │                      ▼                            │
//!                         │               ┌──────────────┐                    │
//!                         │               │  blockchain  │                    │
//!                         │               │ build + sign │                    │
//!                         │               └──────┬───────┘                    │
//!                         │                      │                            │
//!     JSON-RPC reply      │                      ▼                            │
//!     ◀───────────────────┼──────────────── upstream client ─────────────────┼──▶ Node RPC
//!                         │                                                   │
//!                         │  config · observability · resilience · lifecycle  │
//!                         └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use vault_gateway::blockchain::HttpRpcClient;
use vault_gateway::config::{load_or_default, StorageBackend, VaultConfig};
use vault_gateway::gateway::GatewayHandler;
use vault_gateway::http::HttpServer;
use vault_gateway::lifecycle::{wait_for_shutdown_signal, Shutdown};
use vault_gateway::observability::{logging, metrics};
use vault_gateway::resilience::RetryPolicy;
use vault_gateway::vault::{KeyVault, MemoryKeyVault, SqlKeyVault};

/// Interval between upstream health checks.
const UPSTREAM_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "vault-gateway")]
#[command(about = "Custodial key vault and transaction-signing gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.observability)?;
    tracing::info!("vault-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        storage = ?config.storage.backend,
        upstream = %config.upstream.rpc_url,
        failover_urls = config.upstream.failover_urls.len(),
        call_timeout_secs = config.timeouts.call_secs,
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

    let vault = open_vault(&config)?;
    let upstream = connect_upstream(&config).await?;
    let handler = GatewayHandler::new(
        vault,
        upstream.clone(),
        Duration::from_secs(config.timeouts.call_secs),
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let shutdown = Shutdown::new();
    let health_task = upstream.spawn_health_monitor(UPSTREAM_HEALTH_INTERVAL, shutdown.subscribe());
    let server = HttpServer::new(&config, handler);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_shutdown_signal().await;
    shutdown.trigger();
    server_task.await??;
    health_task.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn open_vault(config: &VaultConfig) -> Result<Arc<dyn KeyVault>, Box<dyn std::error::Error>> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            let vault = SqlKeyVault::open(
                Path::new(&config.storage.path),
                Duration::from_millis(config.storage.busy_timeout_ms),
            )?;
            tracing::info!(path = %config.storage.path, "Key vault opened");
            Ok(Arc::new(vault))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory key vault; keys are lost on exit");
            Ok(Arc::new(MemoryKeyVault::new()))
        }
    }
}

async fn connect_upstream(
    config: &VaultConfig,
) -> Result<Arc<HttpRpcClient>, Box<dyn std::error::Error>> {
    let retry = if config.retries.enabled {
        RetryPolicy::from(&config.retries)
    } else {
        RetryPolicy::none()
    };
    let client = HttpRpcClient::new(config.upstream.clone(), retry)?;

    if config.upstream.verify_chain_id {
        match client.verify_chain_id().await {
            Ok(chain_id) => tracing::info!(chain_id = %chain_id, "Upstream chain verified"),
            Err(e) => tracing::warn!(error = %e, "Upstream chain could not be verified"),
        }
    }
    Ok(Arc::new(client))
}
