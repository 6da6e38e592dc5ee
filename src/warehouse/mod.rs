//! # Warehouse Bridge
//!
//! Bidirectional relay between the broker and the legacy warehouse system's
//! TCP socket.

pub mod bridge;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::messaging::MessagingError;

pub use bridge::WarehouseBridge;

/// Legacy socket connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Connected,
    /// A read or write failed; a reconnect is pending
    Lost,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Lost => "lost",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Failed to connect to legacy system at {address}: {message}")]
    Connect { address: String, message: String },

    #[error("Gave up reconnecting to legacy system at {address} after {attempts} attempts")]
    ReconnectExhausted { address: String, attempts: u32 },

    #[error("Legacy socket {operation} failed: {message}")]
    Io { operation: String, message: String },

    #[error("Inbound relay is already running")]
    InboundAlreadyRunning,

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

impl WarehouseError {
    pub fn connect(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn io(operation: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            message: err.to_string(),
        }
    }
}

/// Relay counters
#[derive(Debug, Default)]
pub struct BridgeStats {
    pub lines_received: AtomicU64,
    pub events_published: AtomicU64,
    pub unknown_events: AtomicU64,
    pub events_filtered: AtomicU64,
    pub frames_sent: AtomicU64,
    pub write_retries: AtomicU64,
    pub reconnects: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStatsSnapshot {
    pub lines_received: u64,
    pub events_published: u64,
    pub unknown_events: u64,
    pub events_filtered: u64,
    pub frames_sent: u64,
    pub write_retries: u64,
    pub reconnects: u64,
}

impl BridgeStats {
    pub fn snapshot(&self) -> BridgeStatsSnapshot {
        BridgeStatsSnapshot {
            lines_received: self.lines_received.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            unknown_events: self.unknown_events.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            write_retries: self.write_retries.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}
