//! # Messaging
//!
//! Broker access for both services.
//!
//! - [`service`]: provider-agnostic queue operations (RabbitMQ, in-memory)
//! - [`broker`]: the connection manager with reconnect, publish and the
//!   sequential consume loop
//! - [`message`]: typed JSON records exchanged over the broker

pub mod broker;
pub mod errors;
pub mod message;
pub mod service;

pub use broker::{
    BrokerConnectionManager, BrokerConnector, ConsumerStats, DeliveryOutcome, MessageHandler,
};
pub use errors::{MessagingError, MessagingResult};
pub use message::{
    Address, ResultStatusTag, RouteRequest, RoutePlan, RoutingRequest, RoutingResult,
};
pub use service::{
    redact_url, Delivery, InMemoryMessagingService, MessageId, MessagingProvider,
    MessagingService, QueueMessage, QueueStats, QueueTopology, QueuedMessage,
    RabbitMqMessagingService, ReceiptHandle,
};
