//! Route optimization service client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::OptimizerConfig;
use crate::constants::OPTIMIZE_ROUTE_PATH;
use crate::messaging::message::{RoutePlan, RouteRequest};

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Route optimizer request timed out after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    #[error("Route optimizer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Route optimizer request failed: {message}")]
    Transport { message: String },

    #[error("Route optimizer response is invalid: {message}")]
    InvalidResponse { message: String },

    #[error("Route optimizer client configuration error: {message}")]
    Configuration { message: String },
}

impl OptimizerError {
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

/// Computes a route for one vehicle/order pair
#[async_trait]
pub trait RouteOptimizer: Send + Sync {
    async fn optimize(&self, request: &RouteRequest) -> Result<RoutePlan, OptimizerError>;
}

/// HTTP client for `POST <base_url>/optimize-route`
#[derive(Debug, Clone)]
pub struct HttpRouteOptimizer {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpRouteOptimizer {
    pub fn new(config: &OptimizerConfig) -> Result<Self, OptimizerError> {
        let timeout = config.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("logistics-bridge/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OptimizerError::Configuration {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                OPTIMIZE_ROUTE_PATH
            ),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, err: reqwest::Error) -> OptimizerError {
        if err.is_timeout() {
            OptimizerError::Timeout {
                timeout_seconds: self.timeout.as_secs(),
            }
        } else {
            OptimizerError::Transport {
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl RouteOptimizer for HttpRouteOptimizer {
    async fn optimize(&self, request: &RouteRequest) -> Result<RoutePlan, OptimizerError> {
        debug!(
            url = %self.endpoint,
            order_id = %request.order_id,
            vehicle_id = %request.vehicle_id,
            "Requesting route optimization"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = %status, order_id = %request.order_id, "Route optimizer rejected request");
            return Err(OptimizerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.map_send_error(e)
                } else {
                    OptimizerError::invalid_response(e.to_string())
                }
            })?;

        RoutePlan::from_value(body).map_err(|e| OptimizerError::invalid_response(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::message::{Address, RoutingRequest};
    use serde_json::json;

    fn route_request() -> RouteRequest {
        let request = RoutingRequest {
            order_id: "ORD1".to_string(),
            delivery_address: "12 Lake Rd".to_string(),
            city: "Colombo".to_string(),
            postal_code: "00100".to_string(),
            country: None,
        };
        RouteRequest::for_order(&request, "V1")
    }

    fn optimizer_for(base_url: String, timeout_seconds: u64) -> HttpRouteOptimizer {
        HttpRouteOptimizer::new(&OptimizerConfig {
            base_url,
            timeout_seconds,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let optimizer = optimizer_for("http://ros:8001/".to_string(), 15);
        assert_eq!(optimizer.endpoint(), "http://ros:8001/optimize-route");
    }

    #[tokio::test]
    async fn test_successful_optimization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/optimize-route")
            .match_body(mockito::Matcher::PartialJson(json!({
                "orderId": "ORD1",
                "vehicleId": "V1",
                "pickup": serde_json::to_value(Address::central_warehouse()).unwrap()
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"routeId":"ROUTE-1","waypoints":["A","B"],"estimatedDurationMinutes":30}"#)
            .create_async()
            .await;

        let plan = optimizer_for(server.url(), 15)
            .optimize(&route_request())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(plan.route_id.as_deref(), Some("ROUTE-1"));
        assert_eq!(plan.estimated_duration_minutes, Some(30.0));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/optimize-route")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let err = optimizer_for(server.url(), 15)
            .optimize(&route_request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OptimizerError::Status { status: 503, ref body } if body == "overloaded"
        ));
    }

    #[tokio::test]
    async fn test_non_object_body_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/optimize-route")
            .with_status(200)
            .with_body("[1,2,3]")
            .create_async()
            .await;

        let err = optimizer_for(server.url(), 15)
            .optimize(&route_request())
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_unresponsive_service_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let err = optimizer_for(format!("http://{addr}"), 1)
            .optimize(&route_request())
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizerError::Timeout { timeout_seconds: 1 }));
        hold.abort();
    }
}
