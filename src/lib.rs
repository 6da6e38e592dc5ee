#![allow(clippy::doc_markdown)] // Allow technical terms like RabbitMQ, PostgreSQL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Logistics Bridge
//!
//! Message-bridging core of a logistics platform. It connects the order
//! orchestrator to two downstream systems over RabbitMQ:
//!
//! - an **order routing consumer** that assigns a vehicle to each order,
//!   asks the route optimization service for a route and publishes the
//!   routed order;
//! - a **warehouse bridge** that relays orders to a legacy warehouse system
//!   speaking a line-oriented TCP protocol and republishes its status lines.
//!
//! ## Delivery guarantees
//!
//! Every consumed message is either fully handled and acknowledged, or
//! rejected without requeue so the broker moves it to the queue's
//! dead-letter queue. Queues and messages are durable. A lost broker or
//! legacy connection is re-established under a [`ReconnectPolicy`]
//! (fixed 5 second delay, retried indefinitely, by default).
//!
//! ## Module Organization
//!
//! - [`messaging`] - Broker connection manager, providers and domain messages
//! - [`legacy`] - Legacy warehouse protocol codec and line framing
//! - [`warehouse`] - Bidirectional legacy socket relay
//! - [`routing`] - Resource registry, route optimizer client, routing consumer
//! - [`config`] - Layered configuration
//! - [`resilience`] - Reconnect policies
//! - [`logging`] - Structured logging setup
//! - [`bootstrap`] - Service wiring for the two binaries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logistics_bridge::bootstrap::WarehouseService;
//! use logistics_bridge::config::ConfigManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let service = WarehouseService::from_config(manager.config());
//! service.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`ReconnectPolicy`]: resilience::ReconnectPolicy

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod legacy;
pub mod logging;
pub mod messaging;
pub mod resilience;
pub mod routing;
pub mod warehouse;

pub use config::{BridgeConfig, ConfigManager, ConfigurationError};
pub use error::{BridgeError, BridgeResult};
pub use legacy::{LegacyEvent, WarehouseCommand};
pub use messaging::{
    BrokerConnectionManager, BrokerConnector, MessageHandler, MessagingError, RoutingRequest,
    RoutingResult,
};
pub use resilience::ReconnectPolicy;
pub use routing::{OrderRoutingConsumer, RoutingError};
pub use warehouse::{BridgeState, WarehouseBridge, WarehouseError};
