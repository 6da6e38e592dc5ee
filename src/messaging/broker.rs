//! # Broker Connection Manager
//!
//! Owns the broker connection for one service instance and exposes the
//! three primitives the rest of the crate uses:
//!
//! - [`BrokerConnectionManager::connect`] opens a connection and declares
//!   every owned queue with its dead-letter routing
//! - [`BrokerConnectionManager::publish`] sends a persistent message
//! - [`BrokerConnectionManager::consume`] runs a sequential consume loop,
//!   acking on handler success and dead-lettering on handler failure
//!
//! Transport failures drop the cached connection and reconnect on the
//! configured [`ReconnectPolicy`]. The manager is shared through `Arc` and
//! passed explicitly to every component that publishes or consumes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::RabbitmqConfig;
use crate::error::BridgeError;
use crate::messaging::service::{
    redact_url, Delivery, InMemoryMessagingService, MessageId, MessagingProvider, QueueMessage,
    QueueTopology, RabbitMqMessagingService, SharedProvider,
};
use crate::messaging::{MessagingError, MessagingResult};
use crate::resilience::{reconnect_with, ReconnectPolicy};

/// Per-message callback for [`BrokerConnectionManager::consume`]
///
/// `Ok` acknowledges the delivery. `Err` rejects it without requeue, which
/// routes it to the queue's dead-letter queue.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Result<(), BridgeError>;

    /// Called once the broker has accepted the ack or reject for `delivery`
    async fn on_settled(&self, _delivery: &Delivery, _outcome: DeliveryOutcome) {}
}

/// How a delivery left the consume loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acknowledged,
    DeadLettered,
}

/// Source of new broker connections
#[derive(Debug, Clone)]
pub enum BrokerConnector {
    RabbitMq(RabbitmqConfig),
    InMemory(InMemoryMessagingService),
}

impl BrokerConnector {
    async fn open(&self) -> MessagingResult<MessagingProvider> {
        match self {
            Self::RabbitMq(config) => Ok(MessagingProvider::RabbitMq(
                RabbitMqMessagingService::connect(config).await?,
            )),
            Self::InMemory(service) => {
                if service.is_available() {
                    Ok(MessagingProvider::InMemory(service.clone()))
                } else {
                    Err(MessagingError::connection("in-memory broker unavailable"))
                }
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::RabbitMq(config) => redact_url(&config.url),
            Self::InMemory(_) => "in-memory".to_string(),
        }
    }
}

/// Consume loop counters
#[derive(Debug, Default)]
pub struct ConsumerStats {
    pub acknowledged: AtomicU64,
    pub dead_lettered: AtomicU64,
}

/// Explicit broker connection owned by a service instance
#[derive(Debug)]
pub struct BrokerConnectionManager {
    connector: BrokerConnector,
    topologies: Vec<QueueTopology>,
    policy: ReconnectPolicy,
    current: Mutex<Option<SharedProvider>>,
    connected: AtomicBool,
    reconnects: AtomicU64,
    stats: ConsumerStats,
}

impl BrokerConnectionManager {
    /// Create a manager; no connection is opened until first use
    pub fn new(
        connector: BrokerConnector,
        topologies: Vec<QueueTopology>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            connector,
            topologies,
            policy,
            current: Mutex::new(None),
            connected: AtomicBool::new(false),
            reconnects: AtomicU64::new(0),
            stats: ConsumerStats::default(),
        }
    }

    /// Return the live connection, opening one if needed
    ///
    /// Blocks on the reconnect policy while the broker is unreachable.
    /// Only returns an error once a bounded policy is exhausted.
    pub async fn connect(&self) -> MessagingResult<SharedProvider> {
        let mut current = self.current.lock().await;
        if let Some(provider) = current.as_ref() {
            return Ok(Arc::clone(provider));
        }

        let target = self.connector.describe();
        let provider = reconnect_with(&self.policy, "broker", |attempt| {
            let target = target.clone();
            async move {
                debug!(broker = %target, attempt, "Connecting to broker");
                let provider = self.connector.open().await?;
                provider.ensure_queues(&self.topologies).await?;
                Ok::<_, MessagingError>(provider)
            }
        })
        .await
        .map_err(|exhausted| MessagingError::reconnect_exhausted("broker", exhausted.attempts))?;

        info!(
            broker = %target,
            provider = provider.provider_name(),
            queues = self.topologies.len(),
            "✅ Broker connected, queues declared"
        );

        let provider = Arc::new(provider);
        *current = Some(Arc::clone(&provider));
        self.connected.store(true, Ordering::SeqCst);
        Ok(provider)
    }

    /// Drop a connection that failed, unless it was already replaced
    async fn invalidate(&self, failed: &SharedProvider) {
        let stale = {
            let mut current = self.current.lock().await;
            match current.as_ref() {
                Some(active) if Arc::ptr_eq(active, failed) => current.take(),
                _ => None,
            }
        };

        if let Some(stale) = stale {
            self.connected.store(false, Ordering::SeqCst);
            self.reconnects.fetch_add(1, Ordering::Relaxed);
            warn!(provider = stale.provider_name(), "🔌 Broker connection lost");
            stale.close().await;
        }
    }

    /// Publish a persistent JSON message
    ///
    /// Safe to call while a consume loop runs on the same manager. A
    /// transport failure drops the connection and the publish is repeated on
    /// a fresh one; content errors are returned immediately.
    pub async fn publish<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> MessagingResult<MessageId> {
        let mut attempt: u32 = 1;
        loop {
            let provider = self.connect().await?;
            match provider.send_message(queue_name, message).await {
                Ok(id) => {
                    debug!(queue = %queue_name, message_id = %id, "📤 Published");
                    return Ok(id);
                }
                Err(e) if e.is_transport() => {
                    self.invalidate(&provider).await;
                    if !self.policy.allows_attempt(attempt + 1) {
                        return Err(e);
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        queue = %queue_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Publish failed, retrying on a new connection"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Consume `queue_name`, one delivery at a time
    ///
    /// Each delivery is fully handled and acked or dead-lettered before the
    /// next is taken from the stream. Reconnects forever under the default
    /// policy; returns an error only when a bounded policy is exhausted or
    /// the queue cannot be subscribed for a non-transport reason.
    pub async fn consume<H>(&self, queue_name: &str, handler: &H) -> MessagingResult<()>
    where
        H: MessageHandler + ?Sized,
    {
        let mut failures: u32 = 0;
        loop {
            let provider = self.connect().await?;

            match provider.subscribe(queue_name).await {
                Ok(mut stream) => {
                    info!(queue = %queue_name, "📥 Consume loop started");
                    while let Some(item) = stream.next().await {
                        let delivery = match item {
                            Ok(delivery) => delivery,
                            Err(e) => {
                                warn!(queue = %queue_name, error = %e, "Delivery stream failed");
                                break;
                            }
                        };
                        failures = 0;
                        if let Err(e) = self
                            .process_delivery(&provider, queue_name, handler, delivery)
                            .await
                        {
                            warn!(queue = %queue_name, error = %e, "Acknowledgment failed");
                            break;
                        }
                    }
                }
                Err(e) if e.is_transport() => {
                    warn!(queue = %queue_name, error = %e, "Subscribe failed");
                }
                Err(e) => return Err(e),
            }

            self.invalidate(&provider).await;
            failures = failures.saturating_add(1);
            if !self.policy.allows_attempt(failures + 1) {
                return Err(MessagingError::reconnect_exhausted(
                    format!("consumer:{queue_name}"),
                    failures,
                ));
            }
            tokio::time::sleep(self.policy.delay_for_attempt(failures)).await;
        }
    }

    /// Run the handler for one delivery and settle it
    pub async fn process_delivery<H>(
        &self,
        provider: &MessagingProvider,
        queue_name: &str,
        handler: &H,
        delivery: Delivery,
    ) -> MessagingResult<DeliveryOutcome>
    where
        H: MessageHandler + ?Sized,
    {
        match handler.handle(&delivery).await {
            Ok(()) => {
                provider
                    .ack_message(queue_name, &delivery.receipt_handle)
                    .await?;
                self.stats.acknowledged.fetch_add(1, Ordering::Relaxed);
                debug!(queue = %queue_name, receipt = %delivery.receipt_handle, "Acknowledged");
                handler
                    .on_settled(&delivery, DeliveryOutcome::Acknowledged)
                    .await;
                Ok(DeliveryOutcome::Acknowledged)
            }
            Err(e) => {
                error!(
                    queue = %queue_name,
                    receipt = %delivery.receipt_handle,
                    redelivered = delivery.redelivered,
                    error = %e,
                    "❌ Message rejected, routing to dead-letter queue"
                );
                provider
                    .nack_message(queue_name, &delivery.receipt_handle, false)
                    .await?;
                self.stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                handler
                    .on_settled(&delivery, DeliveryOutcome::DeadLettered)
                    .await;
                Ok(DeliveryOutcome::DeadLettered)
            }
        }
    }

    /// Whether a connection is currently cached
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connections dropped after a failure since startup
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Consume loop counters
    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    /// Queues declared on every connection
    pub fn topologies(&self) -> &[QueueTopology] {
        &self.topologies
    }

    /// Check the cached connection, if any
    pub async fn health_check(&self) -> MessagingResult<bool> {
        let provider = self.current.lock().await.clone();
        match provider {
            Some(provider) => provider.health_check().await,
            None => Ok(false),
        }
    }
}
