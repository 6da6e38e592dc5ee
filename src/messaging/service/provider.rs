//! # Messaging Provider Enum
//!
//! Enum dispatch over the concrete providers, avoiding trait objects for a
//! trait with generic methods.

use std::sync::Arc;

use super::providers::{InMemoryMessagingService, RabbitMqMessagingService};
use super::traits::{DeliveryStream, MessagingService, QueueMessage};
use super::types::{MessageId, QueueStats, QueueTopology, ReceiptHandle};
use super::MessagingError;

/// A live broker connection
///
/// # Variants
///
/// - `RabbitMq` - AMQP 0.9.1 via lapin
/// - `InMemory` - shared in-memory broker for tests
#[derive(Debug)]
pub enum MessagingProvider {
    RabbitMq(RabbitMqMessagingService),
    InMemory(InMemoryMessagingService),
}

impl MessagingProvider {
    /// Get the provider name for logging
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::RabbitMq(s) => s.provider_name(),
            Self::InMemory(s) => s.provider_name(),
        }
    }

    /// Declare a queue with dead-letter routing
    pub async fn ensure_queue(&self, topology: &QueueTopology) -> Result<(), MessagingError> {
        match self {
            Self::RabbitMq(s) => s.ensure_queue(topology).await,
            Self::InMemory(s) => s.ensure_queue(topology).await,
        }
    }

    /// Declare several queues
    pub async fn ensure_queues(&self, topologies: &[QueueTopology]) -> Result<(), MessagingError> {
        match self {
            Self::RabbitMq(s) => s.ensure_queues(topologies).await,
            Self::InMemory(s) => s.ensure_queues(topologies).await,
        }
    }

    /// Publish a persistent message
    pub async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> Result<MessageId, MessagingError> {
        match self {
            Self::RabbitMq(s) => s.send_message(queue_name, message).await,
            Self::InMemory(s) => s.send_message(queue_name, message).await,
        }
    }

    /// Start a push subscription
    pub async fn subscribe(&self, queue_name: &str) -> Result<DeliveryStream, MessagingError> {
        match self {
            Self::RabbitMq(s) => s.subscribe(queue_name).await,
            Self::InMemory(s) => s.subscribe(queue_name).await,
        }
    }

    /// Acknowledge a message
    pub async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        match self {
            Self::RabbitMq(s) => s.ack_message(queue_name, receipt_handle).await,
            Self::InMemory(s) => s.ack_message(queue_name, receipt_handle).await,
        }
    }

    /// Negative acknowledge a message
    pub async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError> {
        match self {
            Self::RabbitMq(s) => s.nack_message(queue_name, receipt_handle, requeue).await,
            Self::InMemory(s) => s.nack_message(queue_name, receipt_handle, requeue).await,
        }
    }

    /// Get queue statistics
    pub async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        match self {
            Self::RabbitMq(s) => s.queue_stats(queue_name).await,
            Self::InMemory(s) => s.queue_stats(queue_name).await,
        }
    }

    /// Health check
    pub async fn health_check(&self) -> Result<bool, MessagingError> {
        match self {
            Self::RabbitMq(s) => s.health_check().await,
            Self::InMemory(s) => s.health_check().await,
        }
    }

    /// Release the underlying connection, best effort
    pub async fn close(&self) {
        if let Self::RabbitMq(s) = self {
            s.close().await;
        }
    }
}

/// Shared handle to a live provider
pub type SharedProvider = Arc<MessagingProvider>;
