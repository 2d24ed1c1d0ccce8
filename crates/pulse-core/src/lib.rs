//! # pulse-core
//!
//! Realtime update channel for the investment dashboards, providing:
//!
//! - **Channel** (`ws::channel`): one authenticated push connection with bounded exponential-backoff reconnects
//! - **Transport** (`ws::client`): `Connector`/`Socket` seams and the `tokio-tungstenite` implementation
//! - **Backoff** (`backoff`): `ReconnectPolicy` and the attempt counter
//! - **Events** (`event`): inbound frame parsing, event kinds and refresh targets
//! - **Auth** (`auth`): user/admin credentials and the auth frame
//! - **State** (`state`): `ConnectionState`
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `PulseError` via thiserror
//! - **Logging** (`logging`): tracing-based structured logging

pub mod auth;
pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod state;
pub mod ws;

pub use auth::Credential;
pub use backoff::ReconnectPolicy;
pub use error::PulseError;
pub use event::{EventKind, InboundEvent, Refresh};
pub use state::ConnectionState;
pub use ws::RealtimeChannel;
