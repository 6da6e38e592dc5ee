//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use logistics_bridge::resilience::ReconnectPolicy;
use logistics_bridge::routing::Resource;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;

pub const WAIT: Duration = Duration::from_secs(5);

/// Short fixed delay, bounded so a broken test fails instead of hanging
pub fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy::fixed(Duration::from_millis(10)).with_max_attempts(200)
}

/// Poll `check` until it returns true or `WAIT` elapses
pub async fn wait_until<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(WAIT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

pub fn routing_request(order_id: &str) -> Value {
    json!({
        "orderId": order_id,
        "deliveryAddress": "45 Galle Rd",
        "city": "Colombo",
        "postalCode": "00300"
    })
}

pub fn resource(id: &str, vehicle_id: &str, available: bool) -> Resource {
    Resource {
        id: id.to_string(),
        vehicle_id: vehicle_id.to_string(),
        is_available: available,
        driver_name: Some(format!("Driver {id}")),
        kind: Some("van".to_string()),
    }
}

/// Stand-in for the legacy warehouse system
pub struct LegacyServer {
    listener: TcpListener,
}

impl LegacyServer {
    pub async fn bind() -> Self {
        Self {
            listener: TcpListener::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    pub fn host(&self) -> String {
        self.listener.local_addr().unwrap().ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    pub async fn accept(&self) -> LegacyConnection {
        let (socket, _) = tokio::time::timeout(WAIT, self.listener.accept())
            .await
            .expect("bridge did not connect")
            .unwrap();
        let (reader, writer) = socket.into_split();
        LegacyConnection {
            reader: BufReader::new(reader),
            writer,
        }
    }
}

/// One accepted bridge session, seen from the legacy side
pub struct LegacyConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl LegacyConnection {
    pub async fn send(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Next frame written by the bridge, without its terminator
    pub async fn read_frame(&mut self) -> String {
        let mut line = String::new();
        let read = tokio::time::timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("no frame from bridge")
            .unwrap();
        assert!(read > 0, "bridge closed the connection");
        line.trim_end_matches('\n').to_string()
    }

    /// Reset the connection
    pub fn drop_connection(self) {
        drop(self);
    }
}
