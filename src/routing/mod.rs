//! # Order Routing
//!
//! Turns routing requests into routed orders: pick an available resource,
//! ask the optimization service for a route, and publish the enriched
//! result. Every failure is classified by the stage it happened in.

pub mod consumer;
pub mod optimizer;
pub mod resources;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messaging::MessagingError;

pub use consumer::{OrderRoutingConsumer, RoutingStats};
pub use optimizer::{HttpRouteOptimizer, OptimizerError, RouteOptimizer};
pub use resources::{
    InMemoryResourceStore, PgResourceStore, Resource, ResourceStore, ResourceStoreError,
};

/// How resource lookup treats concurrent orders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClaimMode {
    /// Plain read; concurrent orders may share a resource
    #[default]
    ReadOnly,
    /// Conditional update that marks the resource unavailable
    AtomicClaim,
}

/// Steps a routing request goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingStage {
    Received,
    Parsed,
    ResourceLookup,
    ResourceFound,
    Optimizing,
    Optimized,
    Published,
    Acked,
    Rejected,
}

impl RoutingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Parsed => "parsed",
            Self::ResourceLookup => "resource_lookup",
            Self::ResourceFound => "resource_found",
            Self::Optimizing => "optimizing",
            Self::Optimized => "optimized",
            Self::Published => "published",
            Self::Acked => "acked",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RoutingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a routing request was rejected
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Malformed routing request: {message}")]
    MalformedRequest { message: String },

    #[error("No available resource for order {order_id}")]
    NoAvailableResource { order_id: String },

    #[error("Resource lookup failed for order {order_id}: {source}")]
    ResourceLookup {
        order_id: String,
        #[source]
        source: ResourceStoreError,
    },

    #[error("Route optimization failed for order {order_id}: {source}")]
    Optimization {
        order_id: String,
        #[source]
        source: OptimizerError,
    },

    #[error("Failed to publish routing result for order {order_id}: {source}")]
    Publish {
        order_id: String,
        #[source]
        source: MessagingError,
    },
}

impl RoutingError {
    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    pub fn no_available_resource(order_id: impl Into<String>) -> Self {
        Self::NoAvailableResource {
            order_id: order_id.into(),
        }
    }

    pub fn resource_lookup(order_id: impl Into<String>, source: ResourceStoreError) -> Self {
        Self::ResourceLookup {
            order_id: order_id.into(),
            source,
        }
    }

    pub fn optimization(order_id: impl Into<String>, source: OptimizerError) -> Self {
        Self::Optimization {
            order_id: order_id.into(),
            source,
        }
    }

    pub fn publish(order_id: impl Into<String>, source: MessagingError) -> Self {
        Self::Publish {
            order_id: order_id.into(),
            source,
        }
    }

    /// Stage the request had reached when it failed
    pub fn stage(&self) -> RoutingStage {
        match self {
            Self::MalformedRequest { .. } => RoutingStage::Received,
            Self::NoAvailableResource { .. } | Self::ResourceLookup { .. } => {
                RoutingStage::ResourceLookup
            }
            Self::Optimization { .. } => RoutingStage::Optimizing,
            Self::Publish { .. } => RoutingStage::Optimized,
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::MalformedRequest { .. } => None,
            Self::NoAvailableResource { order_id }
            | Self::ResourceLookup { order_id, .. }
            | Self::Optimization { order_id, .. }
            | Self::Publish { order_id, .. } => Some(order_id),
        }
    }
}
