//! # Order Routing Consumer
//!
//! Consumes routing requests, assigns a vehicle, asks the optimization
//! service for a route and publishes the routed order.
//!
//! Configuration is read from `$BRIDGE_CONFIG_DIR` (default `./config`) and
//! `BRIDGE__*` environment variables.

use std::path::PathBuf;

use anyhow::Context;
use logistics_bridge::bootstrap::RoutingService;
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
        incoming = %manager.config().routing.incoming_queue,
        "🚀 Starting order routing consumer"
    );

    let service = RoutingService::from_config(manager.config())
        .await
        .context("Failed to build routing service")?;

    tokio::select! {
        result = service.run() => {
            result.context("Routing consumer stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown signal received");
        }
    }

    info!(
        routed = service.consumer.stats().routed(),
        rejected = service.consumer.stats().rejected(),
        "Order routing consumer stopped"
    );
    Ok(())
}
