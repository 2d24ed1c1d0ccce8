//! Typed error definitions for the realtime channel.
//!
//! [`PulseError`] covers the failures the library reports to callers. All
//! variants implement `std::error::Error` via `thiserror`, so they compose with
//! `anyhow::Result` in the runner and the transport layer.

use thiserror::Error;

/// Domain-specific errors for the realtime channel.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// WebSocket connection, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Inbound frame could not be parsed into an event.
    #[error("parse error: {0}")]
    Parse(String),

    /// Outbound frame could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
}
