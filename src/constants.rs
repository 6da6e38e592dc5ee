//! # System Constants
//!
//! Queue names, status tags and fixed values shared by the routing consumer
//! and the warehouse bridge.

use std::time::Duration;

/// Broker queue names used by the default deployment
pub mod queues {
    /// Routing requests published by the orchestrator
    pub const ROUTE_PLANNING: &str = "route-planning";
    /// Routing results consumed by the orchestrator
    pub const ROUTE_UPDATES: &str = "route-updates";
    /// Orders to forward to the legacy warehouse system
    pub const WAREHOUSE_OUTBOUND: &str = "warehouse-queue";
    /// Status events read from the legacy warehouse system
    pub const WAREHOUSE_UPDATES: &str = "warehouse-updates";
}

/// Dead-letter exchanges, one per domain
pub mod exchanges {
    pub const ROUTE_DLX: &str = "route.exchange.dlx";
    pub const WAREHOUSE_DLX: &str = "warehouse.exchange.dlx";
}

/// Suffix appended to a queue name to form its dead-letter routing key
pub const DEAD_LETTER_SUFFIX: &str = ".dlq";

/// Build the dead-letter routing key (and DLQ name) for a queue
pub fn dead_letter_routing_key(queue_name: &str) -> String {
    format!("{queue_name}{DEAD_LETTER_SUFFIX}")
}

/// Fixed pickup location for every route request
pub mod pickup {
    pub const FULL_ADDRESS: &str = "SwiftLogistics Central Warehouse";
    pub const CITY: &str = "Colombo";
    pub const POSTAL_CODE: &str = "00500";
}

/// Legacy wire protocol literals
pub mod legacy {
    /// Connection-teardown signal, forwarded verbatim
    pub const CLOSE_SIGNAL: &str = "close";
    /// Placeholder for a missing order field when encoding
    pub const UNKNOWN_FIELD: &str = "UNKNOWN";
    /// Event tag for lines that are not `orderId:status`
    pub const UNKNOWN_EVENT: &str = "UNKNOWN";
    pub const FIELD_SEPARATOR: char = ':';
    pub const LINE_TERMINATOR: u8 = b'\n';
}

/// Default delay between broker / legacy reconnect attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default bound on a route optimization call
pub const DEFAULT_OPTIMIZER_TIMEOUT: Duration = Duration::from_secs(15);

/// Path of the optimization endpoint relative to the service base URL
pub const OPTIMIZE_ROUTE_PATH: &str = "/optimize-route";

/// Default upper bound for one buffered legacy line
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_letter_routing_key() {
        assert_eq!(
            dead_letter_routing_key(queues::WAREHOUSE_OUTBOUND),
            "warehouse-queue.dlq"
        );
    }
}
