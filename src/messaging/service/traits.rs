//! # Messaging Service Traits
//!
//! Core trait definitions for provider-agnostic broker access.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use super::types::{Delivery, MessageId, QueueStats, QueueTopology, ReceiptHandle};
use super::MessagingError;

/// Push-style stream of deliveries for one queue
///
/// The stream yields an error (or ends) when the underlying connection is
/// lost; the consume loop treats both as a signal to reconnect.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, MessagingError>> + Send>>;

/// Core messaging service trait
///
/// Implementations provide the actual broker backend (RabbitMQ, InMemory).
/// Every queue is durable and declared together with its dead-letter
/// routing; rejecting a delivery without requeue moves it to the DLQ.
#[async_trait]
pub trait MessagingService: Send + Sync + 'static {
    /// Declare a queue and its dead-letter exchange/queue (idempotent)
    async fn ensure_queue(&self, topology: &QueueTopology) -> Result<(), MessagingError>;

    /// Declare several queues
    ///
    /// Default implementation calls `ensure_queue` for each topology.
    async fn ensure_queues(&self, topologies: &[QueueTopology]) -> Result<(), MessagingError> {
        for topology in topologies {
            self.ensure_queue(topology).await?;
        }
        Ok(())
    }

    /// Publish a persistent message to a queue
    async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> Result<MessageId, MessagingError>;

    /// Start a push subscription on a queue
    ///
    /// Deliveries are unacknowledged until `ack_message` or `nack_message`
    /// is called with their receipt handle.
    async fn subscribe(&self, queue_name: &str) -> Result<DeliveryStream, MessagingError>;

    /// Acknowledge successful processing (removes the message)
    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError>;

    /// Negative acknowledge
    ///
    /// * `requeue` - If true, the message returns to the queue. If false, the
    ///   broker routes it through the queue's dead-letter exchange.
    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError>;

    /// Get queue statistics
    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError>;

    /// Health check - verify the broker connection is usable
    async fn health_check(&self) -> Result<bool, MessagingError>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

/// Message serialization contract
///
/// Message bodies on the wire are UTF-8 JSON.
pub trait QueueMessage: Send + Sync + 'static {
    /// Serialize the message to bytes
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError>;

    /// Deserialize the message from bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError>
    where
        Self: Sized;
}

/// JSON serialization for any serde-compatible type
impl<T> QueueMessage for T
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
{
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(bytes)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
    struct StatusPing {
        order_id: String,
    }

    #[test]
    fn test_queue_message_invalid_bytes() {
        let result = StatusPing::from_bytes(b"not valid json");
        assert!(matches!(
            result,
            Err(MessagingError::MessageDeserialization { .. })
        ));
    }

    #[test]
    fn test_queue_message_is_json() {
        let ping = StatusPing {
            order_id: "ORD1".to_string(),
        };
        let bytes = ping.to_bytes().expect("serialization should succeed");
        assert_eq!(bytes, br#"{"order_id":"ORD1"}"#.to_vec());
    }
}
