//! # Messaging Service Types
//!
//! Core types for the provider-agnostic broker abstraction.

use crate::constants::dead_letter_routing_key;

/// Identifier assigned to a published message
///
/// - RabbitMQ: session-local publish counter
/// - InMemory: per-queue sequence number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Handle for acknowledging a delivered message
///
/// - RabbitMQ: delivery tag as string (channel scoped)
/// - InMemory: message sequence number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the handle as a numeric delivery tag
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReceiptHandle {
    fn from(tag: u64) -> Self {
        Self(tag.to_string())
    }
}

impl From<&str> for ReceiptHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

/// A message delivered from a queue, not yet acknowledged
#[derive(Debug, Clone)]
pub struct QueuedMessage<T> {
    /// Handle for acknowledging this message
    pub receipt_handle: ReceiptHandle,

    /// The message payload
    pub message: T,

    /// Whether the broker flagged this as a redelivery
    pub redelivered: bool,

    /// When the message was handed to this consumer
    pub delivered_at: chrono::DateTime<chrono::Utc>,
}

impl<T> QueuedMessage<T> {
    /// Create a new queued message
    pub fn new(receipt_handle: ReceiptHandle, message: T, redelivered: bool) -> Self {
        Self {
            receipt_handle,
            message,
            redelivered,
            delivered_at: chrono::Utc::now(),
        }
    }
}

/// Raw delivery as handed to a consume loop
pub type Delivery = QueuedMessage<Vec<u8>>;

/// Declaration of a durable queue together with its dead-letter routing
///
/// The dead-letter exchange and routing key are bound when the queue is
/// declared. A message rejected without requeue is routed by the broker to
/// the dead-letter queue, which is named after the routing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTopology {
    /// Main queue name
    pub name: String,
    /// Direct exchange receiving rejected messages
    pub dead_letter_exchange: String,
    /// Routing key used for rejected messages (also the DLQ name)
    pub dead_letter_routing_key: String,
}

impl QueueTopology {
    /// Queue with the conventional `<queue>.dlq` routing key
    pub fn new(name: impl Into<String>, dead_letter_exchange: impl Into<String>) -> Self {
        let name = name.into();
        let dead_letter_routing_key = dead_letter_routing_key(&name);
        Self {
            name,
            dead_letter_exchange: dead_letter_exchange.into(),
            dead_letter_routing_key,
        }
    }

    /// Override the dead-letter routing key
    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.dead_letter_routing_key = routing_key.into();
        self
    }

    /// Name of the dead-letter queue bound to the exchange
    pub fn dead_letter_queue(&self) -> &str {
        &self.dead_letter_routing_key
    }
}

/// Queue statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Queue name
    pub queue_name: String,

    /// Messages waiting in the queue
    pub message_count: u64,

    pub total_sent: u64,
    pub total_acked: u64,
    pub total_nacked: u64,
}

impl QueueStats {
    /// Create new queue stats
    pub fn new(queue_name: impl Into<String>, message_count: u64) -> Self {
        Self {
            queue_name: queue_name.into(),
            message_count,
            ..Default::default()
        }
    }

    /// Attach session counters
    pub fn with_counters(mut self, sent: u64, acked: u64, nacked: u64) -> Self {
        self.total_sent = sent;
        self.total_acked = acked;
        self.total_nacked = nacked;
        self
    }
}
