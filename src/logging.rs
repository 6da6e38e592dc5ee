//! # Structured Logging Module
//!
//! Environment-aware structured logging for both bridge processes. Console
//! output is always on; JSON file output is added when a log directory is
//! configured.

use std::fs;
use std::process;
use std::sync::OnceLock;

use chrono::Utc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize structured logging; later calls are no-ops
pub fn init_structured_logging(config: &LoggingConfig, environment: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let directive = resolve_log_level(config.level.as_deref(), environment);
        let console_json = config.json || environment == "production";

        let json_console = console_json.then(|| {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(false)
                .with_filter(EnvFilter::new(&directive))
        });
        let text_console = (!console_json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(&directive))
        });

        let pid = process::id();
        let mut log_file = None;
        let file_layer = config.directory.as_ref().and_then(|dir| {
            if let Err(e) = fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {}: {e}", dir.display());
                return None;
            }
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            let file_name = format!("{environment}.{pid}.{timestamp}.log");
            log_file = Some(dir.join(&file_name));

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);

            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(&directive)),
            )
        });

        let subscriber = tracing_subscriber::registry()
            .with(json_console)
            .with(text_console)
            .with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            level = %directive,
            log_file = ?log_file,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// `RUST_LOG` wins, then the configured level, then the environment default
fn resolve_log_level(configured: Option<&str>, environment: &str) -> String {
    std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| default_log_level(environment).to_string())
}

fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log one stage of routing an order
pub fn log_routing_stage(order_id: Option<&str>, stage: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        order_id = order_id,
        stage = %stage,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🚚 ROUTING_STAGE"
    );
}

/// Log a frame crossing the warehouse bridge
pub fn log_bridge_event(direction: &str, event: &str, details: Option<&str>) {
    tracing::debug!(
        direction = %direction,
        event = %event,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🏭 WAREHOUSE_BRIDGE"
    );
}
