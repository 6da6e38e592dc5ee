//! # Resilience Module
//!
//! Connection recovery for the broker and the legacy warehouse socket.
//!
//! Transport failures are never surfaced to message producers. They are
//! logged and retried on the schedule described by a [`ReconnectPolicy`].

pub mod reconnect;

pub use reconnect::{reconnect_with, ReconnectExhausted, ReconnectPolicy};
