//! # Domain Messages
//!
//! Typed records for the JSON bodies exchanged over the broker and with the
//! route optimization service. Payloads are validated at the boundary: a
//! body that does not deserialize into its record is a message-content
//! failure, never a partially filled record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::pickup;

/// Request to route one order, published by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRequest {
    pub order_id: String,
    pub delivery_address: String,
    pub city: String,
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl RoutingRequest {
    /// Delivery side of the route
    pub fn delivery(&self) -> Address {
        Address {
            full_address: self.delivery_address.clone(),
            city: self.city.clone(),
            postal_code: self.postal_code.clone(),
        }
    }
}

/// A postal address as understood by the optimization service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub full_address: String,
    pub city: String,
    pub postal_code: String,
}

impl Address {
    /// The central warehouse every route starts from
    pub fn central_warehouse() -> Self {
        Self {
            full_address: pickup::FULL_ADDRESS.to_string(),
            city: pickup::CITY.to_string(),
            postal_code: pickup::POSTAL_CODE.to_string(),
        }
    }
}

/// Body of the optimization call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub order_id: String,
    pub vehicle_id: String,
    pub pickup: Address,
    pub delivery: Address,
}

impl RouteRequest {
    /// Route from the central warehouse to the request's delivery address
    pub fn for_order(request: &RoutingRequest, vehicle_id: impl Into<String>) -> Self {
        Self {
            order_id: request.order_id.clone(),
            vehicle_id: vehicle_id.into(),
            pickup: Address::central_warehouse(),
            delivery: request.delivery(),
        }
    }
}

/// Optimization response
///
/// Only the fields that are republished are interpreted; the full response
/// is kept verbatim in `raw`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    pub waypoints: Vec<Value>,
    pub route_id: Option<String>,
    pub status: Option<String>,
    pub estimated_duration_minutes: Option<f64>,
    pub estimated_distance: Option<f64>,
    pub raw: Value,
}

impl RoutePlan {
    /// Interpret a response body; it must be a JSON object
    ///
    /// The republished fields are read leniently: a field of an unexpected
    /// type is treated as absent and the body is still accepted.
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        let Some(fields) = raw.as_object() else {
            return Err(serde::de::Error::custom("route plan must be a JSON object"));
        };
        let waypoints = match fields.get("waypoints") {
            Some(Value::Array(points)) => points.clone(),
            _ => Vec::new(),
        };
        Ok(Self {
            waypoints,
            route_id: fields.get("routeId").and_then(plan_text),
            status: fields.get("status").and_then(plan_text),
            estimated_duration_minutes: fields.get("estimatedDurationMinutes").and_then(plan_number),
            estimated_distance: fields.get("estimatedDistance").and_then(plan_number),
            raw,
        })
    }
}

fn plan_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn plan_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Status tag stamped on routing results
///
/// Older deployments consumed `ROUTE_OPTIMIZED`; current ones `ROUTED`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatusTag {
    #[default]
    Routed,
    RouteOptimized,
}

impl std::fmt::Display for ResultStatusTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Routed => write!(f, "ROUTED"),
            Self::RouteOptimized => write!(f, "ROUTE_OPTIMIZED"),
        }
    }
}

/// Enriched result published once per routed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingResult {
    pub order_id: String,
    pub status: ResultStatusTag,
    pub vehicle_id: String,
    /// Identity key of the assigned resource
    pub driver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    pub waypoints: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,
    /// Full optimization response
    pub plan: Value,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_routing_request_requires_order_id() {
        let missing = json!({"deliveryAddress": "12 Lake Rd", "city": "Colombo", "postalCode": "00100"});
        assert!(serde_json::from_value::<RoutingRequest>(missing).is_err());

        let full = json!({
            "orderId": "ORD1",
            "deliveryAddress": "12 Lake Rd",
            "city": "Colombo",
            "postalCode": "00100",
            "country": "Sri Lanka"
        });
        let request: RoutingRequest = serde_json::from_value(full).unwrap();
        assert_eq!(request.country.as_deref(), Some("Sri Lanka"));
    }

    #[test]
    fn test_route_request_uses_central_warehouse_pickup() {
        let request = RoutingRequest {
            order_id: "ORD1".to_string(),
            delivery_address: "12 Lake Rd".to_string(),
            city: "Colombo".to_string(),
            postal_code: "00100".to_string(),
            country: None,
        };

        let body = serde_json::to_value(RouteRequest::for_order(&request, "V1")).unwrap();
        assert_eq!(
            body,
            json!({
                "orderId": "ORD1",
                "vehicleId": "V1",
                "pickup": {
                    "fullAddress": "SwiftLogistics Central Warehouse",
                    "city": "Colombo",
                    "postalCode": "00500"
                },
                "delivery": {
                    "fullAddress": "12 Lake Rd",
                    "city": "Colombo",
                    "postalCode": "00100"
                }
            })
        );
    }

    #[test]
    fn test_route_plan_keeps_raw_response() {
        let raw = json!({
            "routeId": "ROUTE-1",
            "status": "OPTIMIZED",
            "estimatedDurationMinutes": 42,
            "waypoints": ["Colombo", "Kottawa"],
            "vendorExtra": {"score": 0.9}
        });
        let plan = RoutePlan::from_value(raw.clone()).unwrap();
        assert_eq!(plan.route_id.as_deref(), Some("ROUTE-1"));
        assert_eq!(plan.estimated_duration_minutes, Some(42.0));
        assert_eq!(plan.waypoints.len(), 2);
        assert_eq!(plan.raw, raw);
    }

    #[test]
    fn test_route_plan_without_waypoints_defaults_empty() {
        let plan = RoutePlan::from_value(json!({"status": "OPTIMIZED"})).unwrap();
        assert!(plan.waypoints.is_empty());
        assert!(RoutePlan::from_value(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_route_plan_tolerates_unexpected_field_types() {
        let numeric_id = RoutePlan::from_value(json!({"routeId": 4821})).unwrap();
        assert_eq!(numeric_id.route_id.as_deref(), Some("4821"));

        let null_waypoints = RoutePlan::from_value(json!({"waypoints": null})).unwrap();
        assert!(null_waypoints.waypoints.is_empty());

        let text_distance = json!({"estimatedDistance": "12.4 km", "estimatedDurationMinutes": "35"});
        let plan = RoutePlan::from_value(text_distance.clone()).unwrap();
        assert_eq!(plan.estimated_distance, None);
        assert_eq!(plan.estimated_duration_minutes, Some(35.0));
        assert_eq!(plan.raw, text_distance);
    }

    #[test]
    fn test_result_status_tag_wire_names() {
        assert_eq!(serde_json::to_value(ResultStatusTag::Routed).unwrap(), json!("ROUTED"));
        assert_eq!(
            serde_json::to_value(ResultStatusTag::RouteOptimized).unwrap(),
            json!("ROUTE_OPTIMIZED")
        );
    }
}
