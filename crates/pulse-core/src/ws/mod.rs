//! WebSocket transport and the reconnecting realtime channel built on it.

pub mod channel;
pub mod client;

pub use channel::{OnEventCallback, OnStatusCallback, RealtimeChannel};
pub use client::{
    CLOSE_GOING_AWAY, CLOSE_NORMAL, Connector, Socket, SocketEvent, WsConnector, endpoint_url,
};
