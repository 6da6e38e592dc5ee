//! # Legacy Protocol Codec
//!
//! Conversion between the warehouse system's `<orderId>:<status>` lines and
//! structured records.
//!
//! Decoding is total: the legacy peer is unverified, so any line that is not
//! exactly `id:status` becomes [`LegacyEvent::Unknown`] carrying the raw
//! text. Encoding never fails either; missing order fields are written as
//! `UNKNOWN`. The only rejected input is an outbound broker payload that is
//! neither an order object nor the `"close"` signal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::constants::legacy::{CLOSE_SIGNAL, FIELD_SEPARATOR, UNKNOWN_EVENT, UNKNOWN_FIELD};

/// Outbound payload that cannot become a legacy frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LegacyCodecError {
    #[error("Outbound payload is not valid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Outbound payload must be an order object or \"close\", got {kind}")]
    UnsupportedPayload { kind: &'static str },
}

/// One inbound line from the legacy system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LegacyEventWire", into = "LegacyEventWire")]
pub enum LegacyEvent {
    /// `orderId:status`
    Status { order_id: String, status: String },
    /// Anything else, verbatim
    Unknown { raw: String },
}

/// JSON shape published to the updates queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LegacyEventWire {
    Status {
        #[serde(rename = "orderId")]
        order_id: String,
        status: String,
    },
    Unknown {
        event: String,
        raw: String,
    },
}

impl From<LegacyEventWire> for LegacyEvent {
    fn from(wire: LegacyEventWire) -> Self {
        match wire {
            LegacyEventWire::Status { order_id, status } => Self::Status { order_id, status },
            LegacyEventWire::Unknown { raw, .. } => Self::Unknown { raw },
        }
    }
}

impl From<LegacyEvent> for LegacyEventWire {
    fn from(event: LegacyEvent) -> Self {
        match event {
            LegacyEvent::Status { order_id, status } => Self::Status { order_id, status },
            LegacyEvent::Unknown { raw } => Self::Unknown {
                event: UNKNOWN_EVENT.to_string(),
                raw,
            },
        }
    }
}

impl LegacyEvent {
    /// Status of a status event
    pub fn status(&self) -> Option<&str> {
        match self {
            Self::Status { status, .. } => Some(status),
            Self::Unknown { .. } => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

/// Decode one line (without its terminator)
pub fn decode(line: &str) -> LegacyEvent {
    let mut parts = line.split(FIELD_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(order_id), Some(status), None) => LegacyEvent::Status {
            order_id: order_id.to_string(),
            status: status.to_string(),
        },
        _ => LegacyEvent::Unknown {
            raw: line.to_string(),
        },
    }
}

/// An order to forward to the legacy system
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarehouseOrder {
    pub order_id: Option<String>,
    pub status: Option<String>,
}

/// Outbound broker payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseCommand {
    /// Connection-teardown signal, forwarded verbatim
    Close,
    Order(WarehouseOrder),
}

impl WarehouseCommand {
    /// Parse a broker message body
    pub fn from_payload(payload: &[u8]) -> Result<Self, LegacyCodecError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| LegacyCodecError::InvalidJson {
                message: e.to_string(),
            })?;
        Self::from_value(&value)
    }

    /// Interpret a JSON value; order fields are read leniently
    pub fn from_value(value: &Value) -> Result<Self, LegacyCodecError> {
        match value {
            Value::String(s) if s == CLOSE_SIGNAL => Ok(Self::Close),
            Value::Object(fields) => Ok(Self::Order(WarehouseOrder {
                order_id: field_text(fields.get("orderId")),
                status: field_text(fields.get("status")),
            })),
            other => Err(LegacyCodecError::UnsupportedPayload {
                kind: json_kind(other),
            }),
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Self::Close)
    }
}

impl From<LegacyEvent> for WarehouseCommand {
    fn from(event: LegacyEvent) -> Self {
        match event {
            LegacyEvent::Status { order_id, status } => Self::Order(WarehouseOrder {
                order_id: Some(order_id),
                status: Some(status),
            }),
            LegacyEvent::Unknown { .. } => Self::Order(WarehouseOrder::default()),
        }
    }
}

/// Encode a command as one line (without its terminator)
pub fn encode(command: &WarehouseCommand) -> String {
    match command {
        WarehouseCommand::Close => CLOSE_SIGNAL.to_string(),
        WarehouseCommand::Order(order) => format!(
            "{}{}{}",
            order.order_id.as_deref().unwrap_or(UNKNOWN_FIELD),
            FIELD_SEPARATOR,
            order.status.as_deref().unwrap_or(UNKNOWN_FIELD)
        ),
    }
}

/// Strings as-is, other scalars rendered as JSON text, null as absent
fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
