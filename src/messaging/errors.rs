//! # Messaging Error Types
//!
//! Structured error handling for the broker layer using thiserror.

use thiserror::Error;

/// Broker and queue error types
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Broker connection error: {message}")]
    Connection { message: String },

    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },

    #[error("Network timeout: operation {operation} timed out after {timeout_seconds}s")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },

    #[error("Reconnect attempts exhausted for {component} after {attempts} attempts")]
    ReconnectExhausted { component: String, attempts: u32 },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

impl MessagingError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a queue operation error
    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a queue not found error
    pub fn queue_not_found(queue_name: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.into(),
        }
    }

    /// Create a message serialization error
    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    /// Create a message deserialization error
    pub fn message_deserialization(message: impl Into<String>) -> Self {
        Self::MessageDeserialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_seconds,
        }
    }

    /// Create a reconnect exhausted error
    pub fn reconnect_exhausted(component: impl Into<String>, attempts: u32) -> Self {
        Self::ReconnectExhausted {
            component: component.into(),
            attempts,
        }
    }

    /// Create a queue declaration error
    pub fn queue_creation(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::queue_operation(queue_name, "declare", message)
    }

    /// Create a send error
    pub fn send(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::queue_operation(queue_name, "send", message)
    }

    /// Create a subscribe/receive error
    pub fn receive(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::queue_operation(queue_name, "receive", message)
    }

    /// Create an ack error
    pub fn ack(queue_name: impl Into<String>, delivery_tag: u64, message: impl Into<String>) -> Self {
        Self::queue_operation(queue_name, format!("ack(tag={delivery_tag})"), message)
    }

    /// Create a nack error
    pub fn nack(
        queue_name: impl Into<String>,
        delivery_tag: u64,
        message: impl Into<String>,
    ) -> Self {
        Self::queue_operation(queue_name, format!("nack(tag={delivery_tag})"), message)
    }

    /// Create a queue stats error
    pub fn queue_stats(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::queue_operation(queue_name, "queue_stats", message)
    }

    /// Create an invalid receipt handle error
    pub fn invalid_receipt_handle(handle: impl Into<String>) -> Self {
        Self::Internal {
            message: format!("Invalid receipt handle: {}", handle.into()),
        }
    }

    /// Create a message not found error
    pub fn message_not_found(message_id: impl Into<String>) -> Self {
        Self::Internal {
            message: format!("Message not found: {}", message_id.into()),
        }
    }

    /// Whether the error came from the broker transport rather than the
    /// message itself. Transport failures are recovered by reconnecting.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::QueueOperation { .. } | Self::Timeout { .. }
        )
    }
}

/// Conversion from serde_json::Error to MessagingError
impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() || err.is_eof() {
            MessagingError::message_deserialization(err.to_string())
        } else {
            MessagingError::message_serialization(err.to_string())
        }
    }
}

/// Conversion from lapin::Error to MessagingError
impl From<lapin::Error> for MessagingError {
    fn from(err: lapin::Error) -> Self {
        MessagingError::connection(err.to_string())
    }
}

/// Result type for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;
