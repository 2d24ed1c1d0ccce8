//! Realtime update channel: one authenticated push connection with bounded
//! reconnects.
//!
//! A [`RealtimeChannel`] is a handle to a driver task that owns everything
//! mutable: the socket, the in-flight open, the retry timer, the backoff
//! counter and the registered callbacks. The handle forwards commands over an
//! unbounded channel, so [`connect`](RealtimeChannel::connect),
//! [`close`](RealtimeChannel::close) and callback registration return
//! immediately and take effect in call order.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──open ok──▶ Connected
//!       ▲                      │  ▲                     │
//!       │                 open failed│ retry timer      │ unexpected close
//!       │                      ▼  │                     ▼
//!       └──────── close ◀── Disconnected ◀──────────────┘
//!                              │ attempts exhausted
//!                              ▼
//!                           Errored (until the next explicit connect)
//! ```
//!
//! The driver holds a single `Option` for the socket, the pending open and the
//! retry timer, so there is never more than one of each.
//!
//! Callbacks run on the driver task. A panicking callback is logged and
//! skipped; the connection stays up. If the driver stops for any reason,
//! [`RealtimeChannel::state`] reads `Disconnected` from then on.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};
use url::Url;

use super::client::{CLOSE_ABNORMAL, CLOSE_GOING_AWAY, CLOSE_NORMAL, Connector, OpenFuture, Socket, SocketEvent};
use crate::auth::Credential;
use crate::backoff::{Backoff, ReconnectPolicy};
use crate::event::{InboundEvent, parse_frame};
use crate::state::ConnectionState;

/// Callback invoked on every state change.
///
/// Parameters: `(new_state, human_readable_message)`
pub type OnStatusCallback = Arc<dyn Fn(ConnectionState, &str) + Send + Sync>;

/// Callback invoked once per parsed inbound event.
pub type OnEventCallback = Arc<dyn Fn(&InboundEvent) + Send + Sync>;

enum Command {
    Connect(Credential),
    Close { code: u16, reason: String },
    OnStatus(OnStatusCallback),
    OnEvent(OnEventCallback),
}

/// Handle to a realtime channel.
///
/// Dropping the handle stops the driver and closes any open socket with code
/// 1001. Use [`shutdown`](Self::shutdown) to close with 1000 and wait for the
/// driver to finish.
pub struct RealtimeChannel {
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    task: tokio::task::JoinHandle<()>,
}

impl RealtimeChannel {
    /// Spawn the driver task for `url`. Must be called inside a tokio runtime.
    ///
    /// The channel starts [`Disconnected`](ConnectionState::Disconnected);
    /// nothing is opened until [`connect`](Self::connect).
    pub fn spawn(url: Url, policy: ReconnectPolicy, connector: Arc<dyn Connector>) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let driver = Driver {
            url,
            connector,
            commands: command_rx,
            state_tx,
            state: ConnectionState::Disconnected,
            backoff: Backoff::new(policy),
            credential: None,
            opening: None,
            socket: None,
            retry: None,
            on_status: Vec::new(),
            on_event: Vec::new(),
        };
        let task = tokio::spawn(driver.run());

        Self { commands, state_rx, task }
    }

    /// Open and authenticate the connection.
    ///
    /// No-op while a connection is open or being opened. Otherwise cancels any
    /// pending retry, resets the attempt counter and starts connecting.
    pub fn connect(&self, credential: Credential) {
        self.send(Command::Connect(credential));
    }

    /// Close the connection and cancel any pending retry. Idempotent.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        self.send(Command::Close { code, reason: reason.into() });
    }

    /// Register a status callback.
    pub fn on_status_change<F>(&self, callback: F)
    where
        F: Fn(ConnectionState, &str) + Send + Sync + 'static,
    {
        self.send(Command::OnStatus(Arc::new(callback)));
    }

    /// Register an event callback.
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&InboundEvent) + Send + Sync + 'static,
    {
        self.send(Command::OnEvent(Arc::new(callback)));
    }

    /// Latest state published by the driver.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Close with code 1000 and wait for the driver task to exit.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        let _ = commands.send(Command::Close { code: CLOSE_NORMAL, reason: "shutdown".into() });
        drop(commands);
        if let Err(e) = task.await {
            error!("[realtime] driver task failed: {e}");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("[realtime] driver stopped, command dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Driver task
// ---------------------------------------------------------------------------

struct Driver {
    url: Url,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    state: ConnectionState,
    backoff: Backoff,
    credential: Option<Credential>,
    opening: Option<OpenFuture>,
    socket: Option<Box<dyn Socket>>,
    retry: Option<Pin<Box<Sleep>>>,
    on_status: Vec<OnStatusCallback>,
    on_event: Vec<OnEventCallback>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        debug!("[realtime] handle dropped, stopping driver");
                        self.close(CLOSE_GOING_AWAY, "going away").await;
                        return;
                    }
                },

                result = wait_open(&mut self.opening) => {
                    self.opening = None;
                    self.handle_open(result).await;
                }

                event = wait_socket(&mut self.socket) => self.handle_socket_event(event),

                () = wait_retry(&mut self.retry) => {
                    self.retry = None;
                    debug!("[realtime] retry timer fired (attempt {})", self.backoff.attempts());
                    self.begin_connect();
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect(credential) => {
                if self.socket.is_some() || self.opening.is_some() {
                    debug!("[realtime] connect ignored, already {}", self.state);
                    return;
                }
                self.credential = Some(credential);
                self.retry = None;
                self.backoff.reset();
                self.begin_connect();
            }
            Command::Close { code, reason } => self.close(code, &reason).await,
            Command::OnStatus(cb) => self.on_status.push(cb),
            Command::OnEvent(cb) => self.on_event.push(cb),
        }
    }

    fn begin_connect(&mut self) {
        info!("[realtime] connecting to {}", self.url);
        self.set_state(ConnectionState::Connecting, "Connecting to real-time updates...");

        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        self.opening = Some(Box::pin(async move { connector.open(&url).await }));
    }

    async fn handle_open(&mut self, result: anyhow::Result<Box<dyn Socket>>) {
        let mut socket = match result {
            Ok(s) => s,
            Err(e) => {
                error!("[realtime] connection failed: {e}");
                self.set_state(ConnectionState::Errored, &format!("Connection error: {e}"));
                self.handle_unexpected_close(CLOSE_ABNORMAL, "connection failed");
                return;
            }
        };

        self.backoff.reset();
        info!("[realtime] connected");
        self.set_state(ConnectionState::Connected, "Real-time updates active");

        if let Some(credential) = &self.credential {
            match credential.auth_frame() {
                Ok(frame) => {
                    if let Err(e) = socket.send_text(frame).await {
                        error!("[realtime] auth send failed: {e}");
                    }
                }
                Err(e) => error!("[realtime] auth frame not sent: {e}"),
            }
        }
        self.socket = Some(socket);
    }

    fn handle_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Text(text) => self.dispatch(&text),
            SocketEvent::Error(msg) => {
                error!("[realtime] socket error: {msg}");
                self.set_state(ConnectionState::Errored, &format!("Connection error: {msg}"));
            }
            SocketEvent::Closed { code, reason } => {
                self.socket = None;
                self.handle_unexpected_close(code, &reason);
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match parse_frame(text) {
            Ok(event) => {
                debug!("[realtime] event {:?}", event.discriminator());
                for cb in &self.on_event {
                    if catch_unwind(AssertUnwindSafe(|| cb(&event))).is_err() {
                        error!("[realtime] event callback panicked on {:?}", event.discriminator());
                    }
                }
            }
            Err(e) => warn!("[realtime] dropping inbound frame: {e}"),
        }
    }

    /// Schedule a retry, or give up once the policy is exhausted.
    fn handle_unexpected_close(&mut self, code: u16, reason: &str) {
        warn!("[realtime] disconnected (code={code}, reason={reason:?})");
        self.set_state(ConnectionState::Disconnected, "Real-time updates disconnected");

        match self.backoff.next_delay() {
            Some(delay) => {
                info!("[realtime] reconnect attempt {} in {delay:?}", self.backoff.attempts());
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
            }
            None => {
                error!(
                    "[realtime] max reconnection attempts reached ({})",
                    self.backoff.policy().max_attempts
                );
                self.set_state(
                    ConnectionState::Errored,
                    "Failed to connect to real-time updates: max reconnection attempts reached",
                );
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        self.retry = None;
        self.opening = None;

        if let Some(mut socket) = self.socket.take() {
            info!("[realtime] closing (code={code}, reason={reason:?})");
            if let Err(e) = socket.close(code, reason).await {
                warn!("[realtime] close failed: {e}");
            }
        }
        self.set_state(ConnectionState::Disconnected, "Real-time updates disconnected");
    }

    fn set_state(&mut self, state: ConnectionState, message: &str) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.state_tx.send_replace(state);
        for cb in &self.on_status {
            if catch_unwind(AssertUnwindSafe(|| cb(state, message))).is_err() {
                error!("[realtime] status callback panicked on {state}");
            }
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        // Also runs when the task is aborted or unwinds.
        if self.state != ConnectionState::Disconnected {
            debug!("[realtime] driver stopped while {}", self.state);
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }
}

async fn wait_open(opening: &mut Option<OpenFuture>) -> anyhow::Result<Box<dyn Socket>> {
    match opening {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn wait_socket(socket: &mut Option<Box<dyn Socket>>) -> SocketEvent {
    match socket {
        Some(s) => s.next_event().await,
        None => std::future::pending().await,
    }
}

async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
