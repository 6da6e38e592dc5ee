//! Warehouse bridge against a local TCP stand-in for the legacy system.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_policy, wait_until, LegacyServer};
use logistics_bridge::bootstrap::WarehouseService;
use logistics_bridge::config::BridgeConfig;
use logistics_bridge::messaging::{BrokerConnector, InMemoryMessagingService};
use logistics_bridge::warehouse::BridgeState;
use serde_json::json;

const OUTBOUND: &str = "warehouse-queue";
const OUTBOUND_DLQ: &str = "warehouse-queue.dlq";
const UPDATES: &str = "warehouse-updates";

struct Harness {
    broker: InMemoryMessagingService,
    service: WarehouseService,
    task: tokio::task::JoinHandle<()>,
}

impl Harness {
    async fn start(legacy: &LegacyServer, filter: Option<Vec<String>>) -> Self {
        let broker = InMemoryMessagingService::new();
        let mut config = BridgeConfig::default();
        config.reconnect = fast_policy();
        config.warehouse.host = legacy.host();
        config.warehouse.port = legacy.port();
        config.warehouse.reconnect = fast_policy();
        config.warehouse.inbound_status_filter = filter;

        let service = WarehouseService::with_connector(BrokerConnector::InMemory(broker.clone()), &config);
        service.broker.connect().await.unwrap();

        let bridge = Arc::clone(&service.bridge);
        let task = tokio::spawn(async move {
            let _ = bridge.run().await;
        });

        Self { broker, service, task }
    }

    async fn send_outbound(&self, body: serde_json::Value) {
        self.broker
            .send_raw(OUTBOUND, &serde_json::to_vec(&body).unwrap())
            .await
            .unwrap();
    }

    async fn wait_for_updates(&self, count: usize) {
        wait_until("inbound events", || async move {
            self.broker.queue_length(UPDATES).await >= count
        })
        .await;
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[tokio::test]
async fn test_outbound_orders_become_legacy_frames() {
    let legacy = LegacyServer::bind().await;
    let harness = Harness::start(&legacy, None).await;
    let mut conn = legacy.accept().await;

    harness.send_outbound(json!({"orderId": "ORD1", "status": "PACKED"})).await;
    assert_eq!(conn.read_frame().await, "ORD1:PACKED");

    harness.send_outbound(json!({"status": "PACKED"})).await;
    assert_eq!(conn.read_frame().await, "UNKNOWN:PACKED");

    harness.send_outbound(json!("close")).await;
    assert_eq!(conn.read_frame().await, "close");

    let stats = harness.service.bridge.stats().snapshot();
    assert_eq!(stats.frames_sent, 3);
}

#[tokio::test]
async fn test_unsupported_outbound_payload_is_dead_lettered() {
    let legacy = LegacyServer::bind().await;
    let harness = Harness::start(&legacy, None).await;
    let mut conn = legacy.accept().await;

    harness.send_outbound(json!([1, 2, 3])).await;
    harness.send_outbound(json!({"orderId": "ORD2", "status": "READY"})).await;

    // Only the valid order reaches the legacy system
    assert_eq!(conn.read_frame().await, "ORD2:READY");
    let broker = &harness.broker;
    wait_until("dead-lettered payload", || async move {
        broker.queue_length(OUTBOUND_DLQ).await == 1
    })
    .await;
    assert_eq!(harness.broker.peek_json(OUTBOUND_DLQ).await, vec![json!([1, 2, 3])]);
}

#[tokio::test]
async fn test_inbound_lines_survive_connection_reset() {
    let legacy = LegacyServer::bind().await;
    let harness = Harness::start(&legacy, None).await;

    let mut first = legacy.accept().await;
    first.send(b"ORD1:READY\r\nGARBAGE\n\nORD2:PAR").await;
    harness.wait_for_updates(2).await;
    first.drop_connection();

    let mut second = legacy.accept().await;
    second.send(b"ORD3:DISPATCHED\n").await;
    harness.wait_for_updates(3).await;

    // Give a duplicate or the discarded fragment a chance to show up
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        harness.broker.peek_json(UPDATES).await,
        vec![
            json!({"orderId": "ORD1", "status": "READY"}),
            json!({"event": "UNKNOWN", "raw": "GARBAGE"}),
            json!({"orderId": "ORD3", "status": "DISPATCHED"}),
        ]
    );

    let stats = harness.service.bridge.stats().snapshot();
    assert_eq!(stats.reconnects, 1);
    assert_eq!(stats.lines_received, 3);
    assert_eq!(stats.unknown_events, 1);
    assert_eq!(harness.service.bridge.state(), BridgeState::Connected);
}

#[tokio::test]
async fn test_outbound_resumes_on_new_session_after_reset() {
    let legacy = LegacyServer::bind().await;
    let harness = Harness::start(&legacy, None).await;

    let first = legacy.accept().await;
    first.drop_connection();
    let mut second = legacy.accept().await;

    harness.send_outbound(json!({"orderId": "ORD4", "status": "PICKED"})).await;
    assert_eq!(second.read_frame().await, "ORD4:PICKED");
    assert!(harness.service.bridge.generation() >= 2);
}

#[tokio::test]
async fn test_status_filter_only_republishes_allowed_statuses() {
    let legacy = LegacyServer::bind().await;
    let harness = Harness::start(&legacy, Some(vec!["READY".to_string()])).await;

    let mut conn = legacy.accept().await;
    conn.send(b"ORD1:PACKED\nORD2:READY\n??\n").await;
    harness.wait_for_updates(2).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        harness.broker.peek_json(UPDATES).await,
        vec![
            json!({"orderId": "ORD2", "status": "READY"}),
            json!({"event": "UNKNOWN", "raw": "??"}),
        ]
    );
    assert_eq!(harness.service.bridge.stats().snapshot().events_filtered, 1);
}

#[tokio::test]
async fn test_inbound_event_waits_out_broker_outage() {
    let legacy = LegacyServer::bind().await;
    let harness = Harness::start(&legacy, None).await;
    let mut conn = legacy.accept().await;

    let bridge = &harness.service.bridge;
    wait_until("bridge connected", || async move {
        bridge.state() == BridgeState::Connected
    })
    .await;

    harness.broker.set_available(false).await;
    conn.send(b"ORD5:DELIVERED\n").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.broker.queue_length(UPDATES).await, 0);

    harness.broker.set_available(true).await;
    harness.wait_for_updates(1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        harness.broker.peek_json(UPDATES).await,
        vec![json!({"orderId": "ORD5", "status": "DELIVERED"})]
    );
}
