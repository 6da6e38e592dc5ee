//! # Messaging Service Abstraction Layer
//!
//! Provider-agnostic broker abstraction with enum dispatch.
//!
//! ```text
//! MessagingProvider (enum)
//!   ├── RabbitMq(RabbitMqMessagingService)
//!   └── InMemory(InMemoryMessagingService)
//! ```
//!
//! Each queue is declared as a [`QueueTopology`]: durable, with its
//! dead-letter exchange and routing key fixed at declaration time.

mod provider;
pub mod providers;
mod traits;
mod types;

pub use provider::{MessagingProvider, SharedProvider};
pub use providers::{redact_url, InMemoryMessagingService, RabbitMqMessagingService};
pub use traits::{DeliveryStream, MessagingService, QueueMessage};
pub use types::{Delivery, MessageId, QueueStats, QueueTopology, QueuedMessage, ReceiptHandle};

pub use super::errors::{MessagingError, MessagingResult};
