//! # Order Routing Consumer
//!
//! Handles one routing request at a time:
//!
//! ```text
//! Received -> Parsed -> ResourceLookup -> ResourceFound -> Optimizing
//!          -> Optimized -> Published -> Acked
//! ```
//!
//! Any failure short of `Published` ends in `Rejected`: the delivery is
//! dead-lettered and no result is emitted. The result is published before
//! the delivery is acknowledged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::RoutingConfig;
use crate::error::BridgeError;
use crate::logging::log_routing_stage;
use crate::messaging::message::{RoutePlan, RouteRequest, RoutingRequest, RoutingResult};
use crate::messaging::{
    BrokerConnectionManager, Delivery, DeliveryOutcome, MessageHandler, MessagingResult,
};

use super::{Resource, ResourceClaimMode, ResourceStore, RouteOptimizer, RoutingError, RoutingStage};

/// Request counters; `routed` counts published results, before the ack
#[derive(Debug, Default)]
pub struct RoutingStats {
    pub routed: AtomicU64,
    pub rejected: AtomicU64,
}

impl RoutingStats {
    pub fn routed(&self) -> u64 {
        self.routed.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

pub struct OrderRoutingConsumer {
    broker: Arc<BrokerConnectionManager>,
    store: Arc<dyn ResourceStore>,
    optimizer: Arc<dyn RouteOptimizer>,
    config: RoutingConfig,
    stats: RoutingStats,
}

impl std::fmt::Debug for OrderRoutingConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderRoutingConsumer")
            .field("incoming_queue", &self.config.incoming_queue)
            .field("outgoing_queue", &self.config.outgoing_queue)
            .field("claim_mode", &self.config.claim_mode)
            .finish()
    }
}

impl OrderRoutingConsumer {
    pub fn new(
        broker: Arc<BrokerConnectionManager>,
        store: Arc<dyn ResourceStore>,
        optimizer: Arc<dyn RouteOptimizer>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            broker,
            store,
            optimizer,
            config,
            stats: RoutingStats::default(),
        }
    }

    /// Consume the incoming queue until the broker policy gives up
    pub async fn run(&self) -> MessagingResult<()> {
        info!(
            incoming = %self.config.incoming_queue,
            outgoing = %self.config.outgoing_queue,
            claim_mode = ?self.config.claim_mode,
            "🚚 Order routing consumer starting"
        );
        if self.config.claim_mode == ResourceClaimMode::ReadOnly {
            warn!("Resources are read without claiming; concurrent consumers may assign the same vehicle");
        }
        self.broker.consume(&self.config.incoming_queue, self).await
    }

    /// Route one request body and publish the result
    pub async fn process(&self, payload: &[u8]) -> Result<RoutingResult, RoutingError> {
        log_routing_stage(None, RoutingStage::Received.as_str(), "ok", None);

        let request: RoutingRequest = serde_json::from_slice(payload)
            .map_err(|e| RoutingError::malformed_request(e.to_string()))?;
        let order_id = request.order_id.clone();
        self.stage(&order_id, RoutingStage::Parsed, None);

        self.stage(&order_id, RoutingStage::ResourceLookup, None);
        let resource = self
            .lookup_resource()
            .await
            .map_err(|e| RoutingError::resource_lookup(&order_id, e))?
            .ok_or_else(|| RoutingError::no_available_resource(&order_id))?;
        self.stage(&order_id, RoutingStage::ResourceFound, Some(&resource.vehicle_id));

        self.stage(&order_id, RoutingStage::Optimizing, None);
        let route_request = RouteRequest::for_order(&request, &resource.vehicle_id);
        let plan = self
            .optimizer
            .optimize(&route_request)
            .await
            .map_err(|e| RoutingError::optimization(&order_id, e))?;
        self.stage(&order_id, RoutingStage::Optimized, plan.route_id.as_deref());

        let result = self.build_result(request, resource, plan);
        self.broker
            .publish(&self.config.outgoing_queue, &result)
            .await
            .map_err(|e| RoutingError::publish(&order_id, e))?;
        self.stage(&order_id, RoutingStage::Published, Some(&self.config.outgoing_queue));

        Ok(result)
    }

    pub fn stats(&self) -> &RoutingStats {
        &self.stats
    }

    async fn lookup_resource(&self) -> Result<Option<Resource>, super::ResourceStoreError> {
        match self.config.claim_mode {
            ResourceClaimMode::ReadOnly => self.store.find_available().await,
            ResourceClaimMode::AtomicClaim => self.store.claim_available().await,
        }
    }

    fn build_result(&self, request: RoutingRequest, resource: Resource, plan: RoutePlan) -> RoutingResult {
        RoutingResult {
            order_id: request.order_id,
            status: self.config.result_status,
            vehicle_id: resource.vehicle_id,
            driver_id: resource.id,
            driver_name: resource.driver_name,
            waypoints: plan.waypoints,
            estimated_time_minutes: plan.estimated_duration_minutes,
            estimated_distance: plan.estimated_distance,
            route_id: plan.route_id,
            plan: plan.raw,
            timestamp: Utc::now(),
        }
    }

    fn stage(&self, order_id: &str, stage: RoutingStage, details: Option<&str>) {
        log_routing_stage(Some(order_id), stage.as_str(), "ok", details);
    }
}

#[async_trait]
impl MessageHandler for OrderRoutingConsumer {
    async fn handle(&self, delivery: &Delivery) -> Result<(), BridgeError> {
        match self.process(&delivery.message).await {
            Ok(_) => {
                self.stats.routed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                error!(
                    order_id = e.order_id(),
                    failed_stage = %e.stage(),
                    error = %e,
                    "❌ Routing request rejected"
                );
                log_routing_stage(e.order_id(), RoutingStage::Rejected.as_str(), "error", Some(&e.to_string()));
                Err(e.into())
            }
        }
    }

    async fn on_settled(&self, delivery: &Delivery, outcome: DeliveryOutcome) {
        if outcome == DeliveryOutcome::Acknowledged {
            let order_id = peek_order_id(&delivery.message);
            log_routing_stage(order_id.as_deref(), RoutingStage::Acked.as_str(), "ok", None);
        }
    }
}

/// Order id of a raw request, if it carries one
fn peek_order_id(payload: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value.get("orderId")?.as_str().map(str::to_string)
}
