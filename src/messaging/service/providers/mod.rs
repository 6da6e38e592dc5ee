//! # Messaging Providers
//!
//! Concrete `MessagingService` implementations.

mod in_memory;
mod rabbitmq;

pub use in_memory::InMemoryMessagingService;
pub use rabbitmq::{redact_url, RabbitMqMessagingService};
