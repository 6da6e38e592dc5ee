//! # Legacy Warehouse Protocol
//!
//! Line-oriented text protocol spoken by the warehouse management system:
//! one `<orderId>:<status>` record per newline-terminated line, plus the
//! `close` control line.

pub mod codec;
pub mod framing;

pub use codec::{decode, encode, LegacyCodecError, LegacyEvent, WarehouseCommand, WarehouseOrder};
pub use framing::LineBuffer;
