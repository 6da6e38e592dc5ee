//! Crate-wide error type.
//!
//! Each layer owns a precise error enum; `BridgeError` is what crosses layer
//! boundaries, most importantly the result of a [`MessageHandler`], which
//! decides between acknowledging and dead-lettering a delivery.
//!
//! [`MessageHandler`]: crate::messaging::MessageHandler

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::legacy::LegacyCodecError;
use crate::messaging::MessagingError;
use crate::routing::RoutingError;
use crate::warehouse::WarehouseError;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    LegacyCodec(#[from] LegacyCodecError),

    #[error("Failed to start {component}: {message}")]
    Startup {
        component: &'static str,
        message: String,
    },
}

impl BridgeError {
    pub fn startup(component: &'static str, message: impl Into<String>) -> Self {
        Self::Startup {
            component,
            message: message.into(),
        }
    }

    /// Short category name for structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Messaging(_) => "messaging",
            Self::Configuration(_) => "configuration",
            Self::Routing(_) => "routing",
            Self::Warehouse(_) => "warehouse",
            Self::LegacyCodec(_) => "legacy_codec",
            Self::Startup { .. } => "startup",
        }
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_display() {
        let err: BridgeError = LegacyCodecError::UnsupportedPayload { kind: "array" }.into();
        assert_eq!(err.kind(), "legacy_codec");
        assert_eq!(
            err.to_string(),
            "Outbound payload must be an order object or \"close\", got array"
        );

        let err: BridgeError = MessagingError::connection("refused").into();
        assert_eq!(err.kind(), "messaging");
        assert!(err.to_string().contains("refused"));
    }
}
