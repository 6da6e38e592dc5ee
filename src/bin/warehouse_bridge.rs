//! # Warehouse Bridge
//!
//! Relays orders from the broker to the legacy warehouse system over TCP and
//! republishes the legacy system's status lines.
//!
//! Configuration is read from `$BRIDGE_CONFIG_DIR` (default `./config`) and
//! `BRIDGE__*` environment variables.

use std::path::PathBuf;

use anyhow::Context;
use logistics_bridge::bootstrap::WarehouseService;
use logistics_bridge::config::ConfigManager;
use logistics_bridge::logging::init_structured_logging;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_dir = std::env::var_os("BRIDGE_CONFIG_DIR").map(PathBuf::from);
    let manager =
        ConfigManager::load_from_directory(config_dir).context("Failed to load configuration")?;
    init_structured_logging(&manager.config().logging, manager.environment());

    info!(
        environment = %manager.environment(),
        legacy_address = %manager.config().warehouse.address(),
        "🚀 Starting warehouse bridge"
    );

    let service = WarehouseService::from_config(manager.config());

    tokio::select! {
        result = service.run() => {
            result.context("Warehouse bridge stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown signal received");
        }
    }

    service.bridge.shutdown().await;
    let stats = service.bridge.stats().snapshot();
    info!(
        frames_sent = stats.frames_sent,
        events_published = stats.events_published,
        reconnects = stats.reconnects,
        "Warehouse bridge stopped"
    );
    Ok(())
}
