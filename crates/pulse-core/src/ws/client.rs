//! WebSocket transport used by the realtime channel.
//!
//! The channel never talks to `tokio-tungstenite` directly. It goes through
//! two small traits:
//!
//! - [`Connector`] opens a socket for a URL.
//! - [`Socket`] sends text, yields inbound [`SocketEvent`]s and closes.
//!
//! [`WsConnector`] is the production implementation (TLS via native-tls).
//! Server pings are answered inside [`Socket::next_event`], so the channel only
//! ever sees text, errors and the final close.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;
use url::Url;

use crate::error::PulseError;

/// Close code reported when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code for an orderly, caller-requested close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code used when the channel owner goes away.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Endpoint path the dashboards connect to.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Something that happened on an open socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A text frame.
    Text(String),
    /// A transport error. A `Closed` event follows.
    Error(String),
    /// The connection is gone. No further events follow.
    Closed { code: u16, reason: String },
}

/// An open, bidirectional message connection.
#[async_trait]
pub trait Socket: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> anyhow::Result<()>;

    /// Wait for the next event. Must be cancel-safe.
    async fn next_event(&mut self) -> SocketEvent;

    /// Close with the given code and reason.
    async fn close(&mut self, code: u16, reason: &str) -> anyhow::Result<()>;
}

/// Opens sockets. Shared by the channel across reconnects.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, url: &Url) -> anyhow::Result<Box<dyn Socket>>;
}

/// In-flight [`Connector::open`] call.
pub type OpenFuture = Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn Socket>>> + Send>>;

// ---------------------------------------------------------------------------
// tokio-tungstenite implementation
// ---------------------------------------------------------------------------

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &Url) -> anyhow::Result<Box<dyn Socket>> {
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| PulseError::WebSocket(format!("connect {url}: {e}")))?;
        Ok(Box::new(WsSocket { stream, failed: false }))
    }
}

struct WsSocket {
    stream: WsStream,
    /// A read error was reported; the next event is the close.
    failed: bool,
}

#[async_trait]
impl Socket for WsSocket {
    async fn send_text(&mut self, text: String) -> anyhow::Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> SocketEvent {
        if self.failed {
            return SocketEvent::Closed { code: CLOSE_ABNORMAL, reason: String::new() };
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return SocketEvent::Text(text.as_str().to_string()),
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        self.failed = true;
                        return SocketEvent::Error(format!("pong send failed: {e}"));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (u16::from(f.code), f.reason.as_str().to_string()),
                        None => (CLOSE_ABNORMAL, String::new()),
                    };
                    return SocketEvent::Closed { code, reason };
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!("[realtime] ignoring {}-byte binary frame", data.len());
                }
                Some(Ok(_)) => {} // Pong, Frame
                Some(Err(e)) => {
                    self.failed = true;
                    return SocketEvent::Error(e.to_string());
                }
                None => return SocketEvent::Closed { code: CLOSE_ABNORMAL, reason: String::new() },
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> anyhow::Result<()> {
        let frame = CloseFrame { code: CloseCode::from(code), reason: reason.to_string().into() };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Endpoint resolution
// ---------------------------------------------------------------------------

/// Derive the push endpoint from the page origin.
///
/// `https` origins map to `wss`, `http` to `ws`; `ws`/`wss` pass through. The
/// host and port are kept, and `path` (default [`DEFAULT_WS_PATH`]) replaces
/// any path on the origin.
pub fn endpoint_url(origin: &str, path: Option<&str>) -> Result<Url, PulseError> {
    let mut url = Url::parse(origin).map_err(|e| PulseError::Config(format!("invalid origin {origin:?}: {e}")))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(PulseError::Config(format!("unsupported origin scheme {other:?}"))),
    };
    if url.host_str().is_none() {
        return Err(PulseError::Config(format!("origin {origin:?} has no host")));
    }

    url.set_scheme(scheme).map_err(|_| PulseError::Config(format!("cannot use scheme {scheme} for {origin:?}")))?;
    url.set_path(path.unwrap_or(DEFAULT_WS_PATH));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_origin_uses_wss() {
        let url = endpoint_url("https://invest.example.com", None).unwrap();
        assert_eq!(url.as_str(), "wss://invest.example.com/ws");
    }

    #[test]
    fn plain_origin_keeps_port() {
        let url = endpoint_url("http://localhost:3000/dashboard.html?tab=1", None).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3000/ws");
    }

    #[test]
    fn custom_path() {
        let url = endpoint_url("wss://push.example.com", Some("/realtime")).unwrap();
        assert_eq!(url.as_str(), "wss://push.example.com/realtime");
    }

    #[test]
    fn bad_origins_rejected() {
        assert!(matches!(endpoint_url("ftp://example.com", None), Err(PulseError::Config(_))));
        assert!(matches!(endpoint_url("not a url", None), Err(PulseError::Config(_))));
    }
}
