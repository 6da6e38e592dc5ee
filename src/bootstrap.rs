//! Service wiring.
//!
//! Builds each process's components from a [`BridgeConfig`]. Every service
//! owns its own [`BrokerConnectionManager`]; nothing is shared through
//! globals.

use std::sync::Arc;

use tracing::info;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::messaging::{BrokerConnectionManager, BrokerConnector};
use crate::routing::{HttpRouteOptimizer, OrderRoutingConsumer, PgResourceStore, ResourceStore, RouteOptimizer};
use crate::warehouse::WarehouseBridge;

/// Order routing consumer and its broker connection
#[derive(Debug, Clone)]
pub struct RoutingService {
    pub broker: Arc<BrokerConnectionManager>,
    pub consumer: Arc<OrderRoutingConsumer>,
}

impl RoutingService {
    /// Connect the resource store and build the consumer
    pub async fn from_config(config: &BridgeConfig) -> BridgeResult<Self> {
        let store = PgResourceStore::connect(&config.resource_store)
            .await
            .map_err(|e| BridgeError::startup("resource store", e.to_string()))?;
        let optimizer = HttpRouteOptimizer::new(&config.optimizer)
            .map_err(|e| BridgeError::startup("route optimizer", e.to_string()))?;

        info!(
            optimizer = %optimizer.endpoint(),
            table = %config.resource_store.table,
            "Routing service components ready"
        );

        Ok(Self::with_parts(
            BrokerConnector::RabbitMq(config.rabbitmq.clone()),
            config,
            Arc::new(store),
            Arc::new(optimizer),
        ))
    }

    /// Assemble from explicit parts
    pub fn with_parts(
        connector: BrokerConnector,
        config: &BridgeConfig,
        store: Arc<dyn ResourceStore>,
        optimizer: Arc<dyn RouteOptimizer>,
    ) -> Self {
        let broker = Arc::new(BrokerConnectionManager::new(
            connector,
            config.routing.topologies(),
            config.reconnect.clone(),
        ));
        let consumer = Arc::new(OrderRoutingConsumer::new(
            Arc::clone(&broker),
            store,
            optimizer,
            config.routing.clone(),
        ));
        Self { broker, consumer }
    }

    pub async fn run(&self) -> BridgeResult<()> {
        self.consumer.run().await?;
        Ok(())
    }
}

/// Warehouse bridge and its broker connection
#[derive(Debug, Clone)]
pub struct WarehouseService {
    pub broker: Arc<BrokerConnectionManager>,
    pub bridge: Arc<WarehouseBridge>,
}

impl WarehouseService {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::with_connector(BrokerConnector::RabbitMq(config.rabbitmq.clone()), config)
    }

    pub fn with_connector(connector: BrokerConnector, config: &BridgeConfig) -> Self {
        let broker = Arc::new(BrokerConnectionManager::new(
            connector,
            config.warehouse.topologies(),
            config.reconnect.clone(),
        ));
        let bridge = Arc::new(WarehouseBridge::new(
            config.warehouse.clone(),
            Arc::clone(&broker),
        ));
        Self { broker, bridge }
    }

    pub async fn run(&self) -> BridgeResult<()> {
        self.bridge.run().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::InMemoryMessagingService;
    use crate::routing::InMemoryResourceStore;

    #[tokio::test]
    async fn test_services_declare_their_own_queues() {
        let config = BridgeConfig::default();
        let routing = RoutingService::with_parts(
            BrokerConnector::InMemory(InMemoryMessagingService::new()),
            &config,
            Arc::new(InMemoryResourceStore::default()),
            Arc::new(HttpRouteOptimizer::new(&config.optimizer).unwrap()),
        );
        let warehouse = WarehouseService::with_connector(
            BrokerConnector::InMemory(InMemoryMessagingService::new()),
            &config,
        );

        let routing_queues: Vec<&str> = routing.broker.topologies().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(routing_queues, vec!["route-planning", "route-updates"]);

        let warehouse_queues: Vec<&str> = warehouse.broker.topologies().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(warehouse_queues, vec!["warehouse-queue", "warehouse-updates"]);
        assert!(!Arc::ptr_eq(&routing.broker, &warehouse.broker));
    }
}
