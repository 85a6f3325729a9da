//! WebSocket connection management with automatic reconnection
//!
//! One [`RoleConnection`] handle fronts one driver task. The driver owns the
//! socket, publishes lifecycle transitions through a watch cell, and services
//! publish/subscribe/close commands between socket events, so every state
//! transition and every delivery happens on a single sequential stream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use types::{Envelope, Role};

use crate::dispatch::{Callback, Dispatcher};
use crate::{RealtimeError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Connection states for the WebSocket lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; a reconnect attempt is pending
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Connected, handshake sent, envelopes flowing
    Open,
    /// Close requested; no further reconnect attempts
    Closing,
}

/// Configuration for one hub connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL of the distribution hub
    pub url: String,
    /// Delay between reconnection attempts
    pub reconnect_delay: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl ConnectionConfig {
    /// Config for `url` with default timing.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Config taken from the deployment's `[realtime]` settings.
    pub fn from_settings(settings: &config::RealtimeSettings) -> Self {
        Self {
            url: settings.endpoint.clone(),
            reconnect_delay: Duration::from_secs(settings.reconnect_delay_secs()),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs()),
        }
    }

    fn validate(&self) -> Result<()> {
        let parsed = Url::parse(&self.url).map_err(|e| RealtimeError::InvalidEndpoint {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(RealtimeError::InvalidEndpoint {
                url: self.url.clone(),
                reason: format!("unsupported scheme {:?}", other),
            }),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_delay: Duration::from_secs(config::DEFAULT_RECONNECT_DELAY_SECS),
            connect_timeout: Duration::from_secs(config::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

enum Command {
    Publish(Envelope),
    Subscribe { id: u64, callback: Callback },
    Unsubscribe(u64),
    Close,
}

/// A role-scoped connection to the distribution hub.
///
/// Construct one per signed-in session and pass it (or just the
/// [`publish`](Self::publish)/[`subscribe`](Self::subscribe) capability) to
/// the code that needs live updates; there is no ambient singleton. The role
/// is fixed for the lifetime of the connection; a role change means opening
/// a new connection and discarding this one.
pub struct RoleConnection {
    role: Role,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    next_subscriber_id: AtomicU64,
}

impl RoleConnection {
    /// Open a connection for `role`.
    ///
    /// Validates the endpoint, then spawns the driver task and returns
    /// immediately; connection establishment proceeds in the background. Must
    /// be called from within a tokio runtime.
    pub fn open(role: Role, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let driver = Driver {
            role,
            config,
            commands: commands_rx,
            state: state_tx,
            dispatcher: Dispatcher::new(role),
        };
        tokio::spawn(driver.run());

        Ok(Self {
            role,
            commands: commands_tx,
            state: state_rx,
            next_subscriber_id: AtomicU64::new(0),
        })
    }

    /// Role this connection is scoped to.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether envelopes are currently flowing.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Watch handle over lifecycle transitions, for hosts that want to show
    /// connectivity and for tests.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Fire-and-forget publish.
    ///
    /// Serialized and sent if the connection is `Open`; otherwise the
    /// envelope is dropped with a diagnostic. Never blocks, never queues:
    /// delivery is at-most-once and the caller cannot distinguish a drop from
    /// a send.
    pub fn publish(&self, envelope: Envelope) {
        let state = self.state();
        if state != ConnectionState::Open {
            warn!("Dropping {} publish while {:?}", envelope.kind(), state);
            return;
        }
        // The driver re-checks: the socket may drop between this send and the
        // command being serviced.
        let _ = self.commands.send(Command::Publish(envelope));
    }

    /// Register `callback` for every envelope addressed to this connection's
    /// role or to broadcast.
    ///
    /// Delivery is synchronous on the dispatch task, in registration order.
    /// Subscriptions survive reconnects; only the returned [`Disposer`]
    /// removes one.
    pub fn subscribe<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&Envelope) + Send + 'static,
    {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.commands.send(Command::Subscribe {
            id,
            callback: Box::new(callback),
        });
        Disposer {
            commands: self.commands.clone(),
            id,
            disposed: AtomicBool::new(false),
        }
    }

    /// Stop the connection: transitions through `Closing`, closes the socket
    /// if one is live, and suppresses all further reconnect attempts.
    /// Idempotent; dropping the handle has the same effect.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

impl Drop for RoleConnection {
    fn drop(&mut self) {
        // Disposers may outlive the handle and keep the command channel
        // alive, so an explicit close is what terminates the retry loop.
        let _ = self.commands.send(Command::Close);
    }
}

/// Removes one subscription when invoked.
///
/// Dropping a disposer does NOT remove the subscription; only calling
/// [`dispose`](Self::dispose) does, and calls after the first are no-ops.
pub struct Disposer {
    commands: mpsc::UnboundedSender<Command>,
    id: u64,
    disposed: AtomicBool,
}

impl Disposer {
    /// Remove the subscription this disposer was returned for.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(Command::Unsubscribe(self.id));
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct Driver {
    role: Role,
    config: ConnectionConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    dispatcher: Dispatcher,
}

impl Driver {
    async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting);

            match self.establish().await {
                Ok(Some(ws)) => {
                    info!("Connected to hub at {} as {}", self.config.url, self.role);
                    if self.session(ws).await == Flow::Stop {
                        break;
                    }
                }
                // Closed (or abandoned) while the attempt was in flight.
                Ok(None) => break,
                Err(e) => {
                    warn!("Connection attempt to {} failed: {}", self.config.url, e);
                }
            }

            self.set_state(ConnectionState::Disconnected);
            debug!("Reconnecting in {:?}", self.config.reconnect_delay);
            if self.wait_for_retry().await == Flow::Stop {
                break;
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    /// Connect with a timeout while still servicing handle commands.
    async fn establish(&mut self) -> Result<Option<WsStream>> {
        let url = self.config.url.clone();
        let connect = timeout(self.config.connect_timeout, connect_async(url));
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok(Ok((ws, response))) => {
                            debug!("Hub accepted connection: {:?}", response.status());
                            Ok(Some(ws))
                        }
                        Ok(Err(e)) => Err(e.into()),
                        Err(_) => Err(RealtimeError::ConnectTimeout {
                            timeout_ms: self.config.connect_timeout.as_millis() as u64,
                        }),
                    };
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.apply(command) == Flow::Stop {
                                return Ok(None);
                            }
                        }
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    /// Drive one established socket: handshake, then interleave inbound
    /// frames with handle commands until the transport drops or the owner
    /// closes.
    async fn session(&mut self, ws: WsStream) -> Flow {
        let (mut sink, mut source) = ws.split();

        // Register routing with the hub before anything else flows.
        if let Err(e) = self.forward(&mut sink, Envelope::handshake(self.role)).await {
            warn!("Handshake failed: {}", e);
            return Flow::Continue;
        }

        self.set_state(ConnectionState::Open);
        debug!("Session open with {} subscribers", self.dispatcher.len());

        loop {
            tokio::select! {
                frame = source.next() => {
                    if self.handle_frame(frame) == Flow::Stop {
                        // Transport drop; rejoin the reconnect loop.
                        return Flow::Continue;
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Publish(envelope)) => {
                            if let Err(e) = self.forward(&mut sink, envelope).await {
                                warn!("Send failed, forcing close: {}", e);
                                return Flow::Continue;
                            }
                        }
                        Some(Command::Subscribe { id, callback }) => {
                            self.dispatcher.subscribe(id, callback);
                        }
                        Some(Command::Unsubscribe(id)) => {
                            self.dispatcher.unsubscribe(id);
                        }
                        Some(Command::Close) | None => {
                            self.set_state(ConnectionState::Closing);
                            let _ = sink.send(Message::Close(None)).await;
                            return Flow::Stop;
                        }
                    }
                }
            }
        }
    }

    /// React to one inbound transport event. `Stop` means the socket is gone.
    fn handle_frame(&self, frame: Option<std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>) -> Flow {
        match frame {
            Some(Ok(Message::Text(text))) => {
                self.dispatcher.handle_frame(&text);
                Flow::Continue
            }
            Some(Ok(Message::Ping(_))) => {
                // tungstenite queues the pong reply itself
                debug!("Ping from hub");
                Flow::Continue
            }
            Some(Ok(Message::Close(_))) => {
                info!("Hub closed the connection");
                Flow::Stop
            }
            Some(Ok(other)) => {
                debug!("Ignoring non-text frame: {:?}", other);
                Flow::Continue
            }
            Some(Err(e)) => {
                warn!("Transport error, forcing close: {}", e);
                Flow::Stop
            }
            None => {
                warn!("Hub stream ended");
                Flow::Stop
            }
        }
    }

    /// Encode and send one envelope on the open socket.
    async fn forward(&mut self, sink: &mut WsSink, envelope: Envelope) -> Result<()> {
        let text = serde_json::to_string(&envelope)?;
        sink.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Sleep out the reconnect delay, still honoring subscribe/close.
    async fn wait_for_retry(&mut self) -> Flow {
        let delay = tokio::time::sleep(self.config.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut delay => return Flow::Continue,
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.apply(command) == Flow::Stop {
                                return Flow::Stop;
                            }
                        }
                        None => return Flow::Stop,
                    }
                }
            }
        }
    }

    /// Service one command while no socket is open.
    fn apply(&mut self, command: Command) -> Flow {
        match command {
            Command::Publish(envelope) => {
                warn!(
                    "Dropping {} publish while {:?}",
                    envelope.kind(),
                    *self.state.borrow()
                );
                Flow::Continue
            }
            Command::Subscribe { id, callback } => {
                self.dispatcher.subscribe(id, callback);
                Flow::Continue
            }
            Command::Unsubscribe(id) => {
                self.dispatcher.unsubscribe(id);
                Flow::Continue
            }
            Command::Close => {
                self.set_state(ConnectionState::Closing);
                Flow::Stop
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Audience;

    #[test]
    fn rejects_non_websocket_endpoints() {
        let err = ConnectionConfig::new("https://hub.campus.test/feed")
            .validate()
            .unwrap_err();
        assert!(matches!(err, RealtimeError::InvalidEndpoint { .. }));

        let err = ConnectionConfig::new("not a url").validate().unwrap_err();
        assert!(matches!(err, RealtimeError::InvalidEndpoint { .. }));

        assert!(ConnectionConfig::new("ws://localhost:8900/feed").validate().is_ok());
        assert!(ConnectionConfig::new("wss://hub.campus.test/feed").validate().is_ok());
    }

    #[test]
    fn config_from_settings_applies_defaults() {
        let settings = config::RealtimeSettings {
            endpoint: "wss://hub.campus.test/feed".to_string(),
            reconnect_delay_secs: Some(1),
            connect_timeout_secs: None,
        };

        let cfg = ConnectionConfig::from_settings(&settings);

        assert_eq!(cfg.url, "wss://hub.campus.test/feed");
        assert_eq!(cfg.reconnect_delay, Duration::from_secs(1));
        assert_eq!(
            cfg.connect_timeout,
            Duration::from_secs(config::DEFAULT_CONNECT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn disposer_sends_exactly_one_unsubscribe() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let disposer = Disposer {
            commands: tx,
            id: 7,
            disposed: AtomicBool::new(false),
        };

        disposer.dispose();
        disposer.dispose();
        disposer.dispose();

        assert!(matches!(rx.try_recv(), Ok(Command::Unsubscribe(7))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_while_unconnected_is_a_quiet_drop() {
        tokio_test::block_on(async {
            // Nothing listens on a discard port; the driver stays in its
            // connect/retry loop the whole time.
            let conn = RoleConnection::open(
                Role::Teacher,
                ConnectionConfig {
                    url: "ws://127.0.0.1:9/feed".to_string(),
                    reconnect_delay: Duration::from_millis(50),
                    connect_timeout: Duration::from_millis(200),
                },
            )
            .unwrap();

            assert_ne!(conn.state(), ConnectionState::Open);
            conn.publish(Envelope::notification(Audience::All, "nobody hears this"));

            let disposer = conn.subscribe(|_| {});
            disposer.dispose();
            disposer.dispose();

            conn.close();
        });
    }
}
