//! gateway-control
//!
//! # Architecture Overview
//!
//! ```text
//!   inventory.toml ──▶ MemoryStore ──▶ Engine
//!                                        │
//!        ┌───────────────────────────────┼───────────────────────────────┐
//!        ▼                               ▼                               ▼
//!  DomainLifecycle               HttpServiceManager              TcpServiceManager
//!  cert → sidecar → vhost        location fragments              stream files
//!        │                               │                               │
//!        └──────────────▶ nginx -t ──▶ reload | *.err ◀──────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use gateway_control::config::loader::{load_config, load_inventory};
use gateway_control::config::watcher::InventoryWatcher;
use gateway_control::config::Inventory;
use gateway_control::lifecycle::{prune, resync, signals, SyncReport};
use gateway_control::nginx::{sweep, ConfLayout};
use gateway_control::observability;
use gateway_control::store::MemoryStore;
use gateway_control::{Adapters, ControlConfig, Engine, Shutdown, Stores};

#[derive(Parser)]
#[command(name = "gateway-control")]
#[command(about = "Reconciles nginx configuration with domain and service records", long_about = None)]
struct Cli {
    /// Control plane configuration. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild everything in the inventory, then reload once
    Sync {
        #[arg(short, long)]
        inventory: PathBuf,
    },
    /// Sync, then re-sync on inventory change or SIGHUP
    Watch {
        #[arg(short, long)]
        inventory: PathBuf,
    },
    /// List quarantined configuration files
    Quarantine,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ControlConfig::default(),
    };

    observability::logging::init(&config.observability.log_level);
    tracing::info!("gateway-control v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let adapters = Adapters::system(&config);

    match cli.command {
        Commands::Sync { inventory } => {
            let (_, report) = sync(&config, &adapters, load_inventory(&inventory)?, None).await?;
            print_json(&report)?;
        }
        Commands::Watch { inventory } => watch(&config, &adapters, &inventory).await?,
        Commands::Quarantine => {
            let report = sweep(&ConfLayout::new(config.paths.clone())).await?;
            print_json(&report)?;
        }
    }

    Ok(())
}

/// Seed a fresh store from `inventory`, prune what `previous` managed but the
/// new inventory dropped, then rebuild. A rejected inventory prunes nothing.
async fn sync(
    config: &ControlConfig,
    adapters: &Adapters,
    inventory: Inventory,
    previous: Option<&Engine>,
) -> Result<(Engine, SyncReport), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::from_config(&config.appliance));
    store.seed(inventory.clone()).await?;

    let pruned = match previous {
        Some(engine) => prune(engine, &inventory).await?,
        None => Vec::new(),
    };

    let engine = Engine::new(config, Stores::memory(store), adapters.clone());
    let mut report = resync(&engine).await?;
    report.pruned = pruned;
    Ok((engine, report))
}

async fn watch(
    config: &ControlConfig,
    adapters: &Adapters,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Arc::new(Shutdown::new());
    let mut stop = shutdown.subscribe();
    let mut hangups = signals::listen(shutdown.clone())?;

    let (watcher, mut changes) = InventoryWatcher::new(path);
    let _watcher = watcher.run()?;

    let (mut engine, report) = sync(config, adapters, load_inventory(path)?, None).await?;
    print_json(&report)?;

    loop {
        let inventory = tokio::select! {
            _ = stop.recv() => break,
            Some(inventory) = changes.recv() => inventory,
            Some(()) = hangups.recv() => match load_inventory(path) {
                Ok(inventory) => inventory,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load inventory; keeping current records");
                    continue;
                }
            },
        };

        match sync(config, adapters, inventory, Some(&engine)).await {
            Ok((next, report)) => {
                engine = next;
                print_json(&report)?;
            }
            Err(e) => tracing::error!(error = %e, "Re-synchronization failed; keeping current records"),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
