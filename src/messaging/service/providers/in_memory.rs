//! # In-Memory Messaging Service
//!
//! Thread-safe in-memory broker for tests and local development.
//!
//! ## Features
//!
//! - **Dead Lettering**: nack without requeue moves the message to the
//!   queue's DLQ when one was declared, mirroring RabbitMQ's DLX routing
//! - **Push Subscriptions**: `subscribe` wakes on publish via `tokio::sync::Notify`
//! - **Outage Simulation**: `set_available(false)` fails every operation,
//!   ends live subscriptions and returns unacked deliveries to the queue

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};
use tracing::debug;

use crate::messaging::service::traits::{DeliveryStream, MessagingService, QueueMessage};
use crate::messaging::service::types::{
    Delivery, MessageId, QueueStats, QueueTopology, QueuedMessage, ReceiptHandle,
};
use crate::messaging::MessagingError;

/// In-memory message with delivery tracking
#[derive(Debug, Clone)]
struct InMemoryQueuedMessage {
    id: u64,
    payload: Vec<u8>,
    /// Handed to a subscriber and not yet acked/nacked
    in_flight: bool,
    redelivered: bool,
}

/// In-memory queue with message storage
#[derive(Debug)]
struct InMemoryQueue {
    messages: VecDeque<InMemoryQueuedMessage>,
    topology: Option<QueueTopology>,
    next_id: u64,
    total_sent: u64,
    total_acked: u64,
    total_nacked: u64,
}

impl InMemoryQueue {
    fn new(topology: Option<QueueTopology>) -> Self {
        Self {
            messages: VecDeque::new(),
            topology,
            next_id: 1,
            total_sent: 0,
            total_acked: 0,
            total_nacked: 0,
        }
    }

    fn push(&mut self, payload: Vec<u8>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.total_sent += 1;
        self.messages.push_back(InMemoryQueuedMessage {
            id,
            payload,
            in_flight: false,
            redelivered: false,
        });
        id
    }
}

type QueueMap = Arc<RwLock<HashMap<String, InMemoryQueue>>>;

/// In-memory messaging service
///
/// Clones share the same queues, so a test can keep a handle while the
/// service under test owns another.
#[derive(Debug, Clone)]
pub struct InMemoryMessagingService {
    queues: QueueMap,
    notify: Arc<Notify>,
    available: Arc<AtomicBool>,
    /// Bumped on every simulated outage; subscriptions from older epochs end
    epoch: Arc<AtomicU64>,
}

impl Default for InMemoryMessagingService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessagingService {
    /// Create a new in-memory messaging service
    pub fn new() -> Self {
        Self {
            queues: Arc::new(RwLock::new(HashMap::new())),
            notify: Arc::new(Notify::new()),
            available: Arc::new(AtomicBool::new(true)),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Simulate the broker going away (`false`) or coming back (`true`)
    pub async fn set_available(&self, available: bool) {
        if !available {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            // The broker requeues whatever a dropped connection left unacked
            let mut queues = self.queues.write().await;
            for queue in queues.values_mut() {
                for msg in queue.messages.iter_mut().filter(|m| m.in_flight) {
                    msg.in_flight = false;
                    msg.redelivered = true;
                }
            }
        }
        self.available.store(available, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether the simulated broker is reachable
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Publish raw bytes, bypassing serialization (for malformed payload tests)
    pub async fn send_raw(&self, queue_name: &str, payload: &[u8]) -> Result<MessageId, MessagingError> {
        self.check_available()?;
        let id = {
            let mut queues = self.queues.write().await;
            let queue = queues
                .get_mut(queue_name)
                .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;
            queue.push(payload.to_vec())
        };
        self.notify.notify_waiters();
        Ok(MessageId::from(id))
    }

    /// Number of messages in a queue, in flight or not
    pub async fn queue_length(&self, queue_name: &str) -> usize {
        let queues = self.queues.read().await;
        queues
            .get(queue_name)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Payloads currently held by a queue, oldest first, parsed as JSON
    pub async fn peek_json(&self, queue_name: &str) -> Vec<serde_json::Value> {
        let queues = self.queues.read().await;
        queues
            .get(queue_name)
            .map(|q| {
                q.messages
                    .iter()
                    .filter_map(|m| serde_json::from_slice(&m.payload).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), MessagingError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(MessagingError::connection("in-memory broker unavailable"))
        }
    }

    fn parse_id(receipt_handle: &ReceiptHandle) -> Result<u64, MessagingError> {
        receipt_handle
            .as_u64()
            .ok_or_else(|| MessagingError::invalid_receipt_handle(receipt_handle.as_str()))
    }
}

/// State carried by one subscription stream
struct Subscription {
    queue_name: String,
    queues: QueueMap,
    notify: Arc<Notify>,
    available: Arc<AtomicBool>,
    epoch: Arc<AtomicU64>,
    subscribed_epoch: u64,
    finished: bool,
}

impl Subscription {
    fn connection_lost(&self) -> bool {
        !self.available.load(Ordering::SeqCst)
            || self.epoch.load(Ordering::SeqCst) != self.subscribed_epoch
    }

    async fn take_next(&self) -> Result<Option<Delivery>, MessagingError> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(&self.queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(&self.queue_name))?;

        Ok(queue.messages.iter_mut().find(|m| !m.in_flight).map(|msg| {
            msg.in_flight = true;
            QueuedMessage::new(
                ReceiptHandle::from(msg.id),
                msg.payload.clone(),
                msg.redelivered,
            )
        }))
    }
}

#[async_trait]
impl MessagingService for InMemoryMessagingService {
    async fn ensure_queue(&self, topology: &QueueTopology) -> Result<(), MessagingError> {
        self.check_available()?;
        let mut queues = self.queues.write().await;
        queues
            .entry(topology.dead_letter_queue().to_string())
            .or_insert_with(|| InMemoryQueue::new(None));
        queues
            .entry(topology.name.clone())
            .or_insert_with(|| InMemoryQueue::new(Some(topology.clone())));
        Ok(())
    }

    async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> Result<MessageId, MessagingError> {
        let payload = message.to_bytes()?;
        self.send_raw(queue_name, &payload).await
    }

    async fn subscribe(&self, queue_name: &str) -> Result<DeliveryStream, MessagingError> {
        self.check_available()?;
        if !self.queues.read().await.contains_key(queue_name) {
            return Err(MessagingError::queue_not_found(queue_name));
        }

        let subscription = Subscription {
            queue_name: queue_name.to_string(),
            queues: Arc::clone(&self.queues),
            notify: Arc::clone(&self.notify),
            available: Arc::clone(&self.available),
            epoch: Arc::clone(&self.epoch),
            subscribed_epoch: self.epoch.load(Ordering::SeqCst),
            finished: false,
        };

        let stream = futures::stream::unfold(subscription, |mut sub| async move {
            if sub.finished {
                return None;
            }
            loop {
                let notify = Arc::clone(&sub.notify);
                let notified = notify.notified();
                tokio::pin!(notified);
                // Register before checking so a publish in between is not missed
                notified.as_mut().enable();

                if sub.connection_lost() {
                    sub.finished = true;
                    return Some((
                        Err(MessagingError::connection("in-memory broker connection lost")),
                        sub,
                    ));
                }

                match sub.take_next().await {
                    Ok(Some(delivery)) => return Some((Ok(delivery), sub)),
                    Ok(None) => notified.await,
                    Err(e) => {
                        sub.finished = true;
                        return Some((Err(e), sub));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }

    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        self.check_available()?;
        let message_id = Self::parse_id(receipt_handle)?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        match queue.messages.iter().position(|m| m.id == message_id) {
            Some(pos) => {
                queue.messages.remove(pos);
                queue.total_acked += 1;
                Ok(())
            }
            None => Err(MessagingError::message_not_found(message_id.to_string())),
        }
    }

    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError> {
        self.check_available()?;
        let message_id = Self::parse_id(receipt_handle)?;

        {
            let mut queues = self.queues.write().await;
            let queue = queues
                .get_mut(queue_name)
                .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

            let pos = queue
                .messages
                .iter()
                .position(|m| m.id == message_id)
                .ok_or_else(|| MessagingError::message_not_found(message_id.to_string()))?;
            queue.total_nacked += 1;

            if requeue {
                if let Some(msg) = queue.messages.get_mut(pos) {
                    msg.in_flight = false;
                    msg.redelivered = true;
                }
            } else {
                let dead = queue.messages.remove(pos);
                let dlq_name = queue
                    .topology
                    .as_ref()
                    .map(|t| t.dead_letter_queue().to_string());

                if let (Some(dead), Some(dlq_name)) = (dead, dlq_name) {
                    if let Some(dlq) = queues.get_mut(&dlq_name) {
                        dlq.push(dead.payload);
                        debug!(queue = %queue_name, dlq = %dlq_name, "Message dead-lettered");
                    }
                }
            }
        }

        self.notify.notify_waiters();
        Ok(())
    }

    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        let queues = self.queues.read().await;
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        Ok(
            QueueStats::new(queue_name, queue.messages.len() as u64).with_counters(
                queue.total_sent,
                queue.total_acked,
                queue.total_nacked,
            ),
        )
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        Ok(self.is_available())
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn topology() -> QueueTopology {
        QueueTopology::new("route-planning", "route.exchange.dlx")
    }

    #[tokio::test]
    async fn test_send_and_subscribe_in_order() {
        let service = InMemoryMessagingService::new();
        service.ensure_queue(&topology()).await.unwrap();

        service
            .send_message("route-planning", &json!({"orderId": "ORD1"}))
            .await
            .unwrap();
        service
            .send_message("route-planning", &json!({"orderId": "ORD2"}))
            .await
            .unwrap();

        let mut stream = service.subscribe("route-planning").await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();

        let first: serde_json::Value = serde_json::from_slice(&first.message).unwrap();
        let second: serde_json::Value = serde_json::from_slice(&second.message).unwrap();
        assert_eq!(first["orderId"], "ORD1");
        assert_eq!(second["orderId"], "ORD2");
    }

    #[tokio::test]
    async fn test_subscribe_wakes_on_publish() {
        let service = InMemoryMessagingService::new();
        service.ensure_queue(&topology()).await.unwrap();

        let mut stream = service.subscribe("route-planning").await.unwrap();
        let publisher = service.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            publisher
                .send_message("route-planning", &json!({"orderId": "LATE"}))
                .await
                .unwrap();
        });

        let delivery = tokio::time::timeout(std::time::Duration::from_secs(2), stream.next())
            .await
            .expect("delivery should arrive")
            .unwrap()
            .unwrap();
        assert!(!delivery.redelivered);
    }

    #[tokio::test]
    async fn test_ack_removes_message() {
        let service = InMemoryMessagingService::new();
        service.ensure_queue(&topology()).await.unwrap();
        service
            .send_message("route-planning", &json!({"orderId": "ORD1"}))
            .await
            .unwrap();

        let mut stream = service.subscribe("route-planning").await.unwrap();
        let delivery = stream.next().await.unwrap().unwrap();
        service
            .ack_message("route-planning", &delivery.receipt_handle)
            .await
            .unwrap();

        assert_eq!(service.queue_length("route-planning").await, 0);
        let stats = service.queue_stats("route-planning").await.unwrap();
        assert_eq!(stats.total_acked, 1);
    }

    #[tokio::test]
    async fn test_nack_without_requeue_dead_letters() {
        let service = InMemoryMessagingService::new();
        service.ensure_queue(&topology()).await.unwrap();
        service
            .send_message("route-planning", &json!({"orderId": "POISON"}))
            .await
            .unwrap();

        let mut stream = service.subscribe("route-planning").await.unwrap();
        let delivery = stream.next().await.unwrap().unwrap();
        service
            .nack_message("route-planning", &delivery.receipt_handle, false)
            .await
            .unwrap();

        assert_eq!(service.queue_length("route-planning").await, 0);
        let dead = service.peek_json("route-planning.dlq").await;
        assert_eq!(dead, vec![json!({"orderId": "POISON"})]);
    }

    #[tokio::test]
    async fn test_nack_with_requeue_redelivers() {
        let service = InMemoryMessagingService::new();
        service.ensure_queue(&topology()).await.unwrap();
        service
            .send_message("route-planning", &json!({"orderId": "ORD1"}))
            .await
            .unwrap();

        let mut stream = service.subscribe("route-planning").await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        service
            .nack_message("route-planning", &first.receipt_handle, true)
            .await
            .unwrap();

        let again = stream.next().await.unwrap().unwrap();
        assert!(again.redelivered);
        assert_eq!(again.receipt_handle, first.receipt_handle);
    }

    #[tokio::test]
    async fn test_outage_ends_subscription_and_requeues_in_flight() {
        let service = InMemoryMessagingService::new();
        service.ensure_queue(&topology()).await.unwrap();
        service
            .send_message("route-planning", &json!({"orderId": "ORD1"}))
            .await
            .unwrap();

        let mut stream = service.subscribe("route-planning").await.unwrap();
        let _in_flight = stream.next().await.unwrap().unwrap();

        service.set_available(false).await;
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
        assert!(service
            .send_message("route-planning", &json!({}))
            .await
            .is_err());

        service.set_available(true).await;
        let mut stream = service.subscribe("route-planning").await.unwrap();
        let redelivered = stream.next().await.unwrap().unwrap();
        assert!(redelivered.redelivered);
    }

    #[tokio::test]
    async fn test_send_to_undeclared_queue_fails() {
        let service = InMemoryMessagingService::new();
        let result = service.send_message("missing", &json!({})).await;
        assert!(matches!(result, Err(MessagingError::QueueNotFound { .. })));
    }
}
