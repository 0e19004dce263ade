use crate::config::ChannelConfig;
use crate::error::ChannelError;
use crate::frame::{parse_frame, Command, Frame, HeartBeat, Inbound};
use crate::session::Session;
use crate::subscription::{lock, FrameSink, SharedRegistry, Subscription, SubscriptionRegistry};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    Requested,
    Closed,
    TransportError(String),
    ServerError(String),
    HeartbeatTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Connected,
    Disconnected(DisconnectReason),
}

impl ChannelState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelState::Connected)
    }
}

/// Topic pub/sub over one persistent connection.
pub trait Realtime: Send + Sync {
    fn state(&self) -> ChannelState;

    /// Fails with `NotConnected` unless the channel is connected.
    fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError>;

    /// Fails with `NotConnected`, sending nothing, unless the channel is connected.
    fn publish(&self, destination: &str, body: String) -> Result<(), ChannelError>;
}

enum ChannelCommand {
    Send(Frame),
    Disconnect,
}

struct LoopHandle {
    tx: mpsc::UnboundedSender<ChannelCommand>,
    cancelled: Arc<AtomicBool>,
}

type CommandSlot = Arc<Mutex<Option<LoopHandle>>>;

fn lock_slot(slot: &CommandSlot) -> std::sync::MutexGuard<'_, Option<LoopHandle>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

struct ChannelInner {
    url: String,
    config: ChannelConfig,
    session: Session,
    state: Arc<watch::Sender<ChannelState>>,
    registry: SharedRegistry,
    commands: CommandSlot,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        if let Some(handle) = lock_slot(&self.commands).take() {
            handle.cancelled.store(true, Ordering::SeqCst);
            let _ = handle.tx.send(ChannelCommand::Disconnect);
        }
    }
}

/// Owned realtime connection. Construct one at the application root and hand
/// clones to whatever needs it; clones share the connection and subscriptions.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    pub fn new(url: impl Into<String>, config: ChannelConfig, session: Session) -> Self {
        let (state, _) = watch::channel(ChannelState::Idle);
        Self {
            inner: Arc::new(ChannelInner {
                url: url.into(),
                config,
                session,
                state: Arc::new(state),
                registry: Arc::new(Mutex::new(SubscriptionRegistry::new())),
                commands: Arc::new(Mutex::new(None)),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Starts the connection task unless one is already running.
    pub fn connect(&self) {
        let mut slot = lock_slot(&self.inner.commands);
        if slot.is_some() {
            tracing::debug!("Channel to {} already running", self.inner.url);
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        *slot = Some(LoopHandle {
            tx,
            cancelled: cancelled.clone(),
        });
        drop(slot);

        let task = ConnectionTask {
            url: self.inner.url.clone(),
            config: self.inner.config.clone(),
            session: self.inner.session.clone(),
            state: self.inner.state.clone(),
            registry: self.inner.registry.clone(),
            slot: self.inner.commands.clone(),
            cancelled,
            commands: rx,
        };
        tokio::spawn(task.run());
    }

    pub fn state(&self) -> ChannelState {
        self.inner.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), ChannelError> {
        let mut rx = self.watch_state();
        let wait = async {
            loop {
                if rx.borrow_and_update().is_connected() {
                    return Ok(());
                }
                if rx.changed().await.is_err() {
                    return Err(ChannelError::Closed);
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ChannelError::Timeout)?
    }

    pub fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError> {
        if !self.state().is_connected() {
            tracing::warn!("Cannot subscribe to {}: channel not connected", topic);
            return Err(ChannelError::NotConnected);
        }
        let slot = self.inner.commands.clone();
        let sink: FrameSink = Arc::new(move |frame: Frame| {
            send_command(&slot, ChannelCommand::Send(frame));
        });
        tracing::debug!("Subscribing to {}", topic);
        Ok(Subscription::register(&self.inner.registry, topic, sink))
    }

    pub fn publish(&self, destination: &str, body: impl Into<String>) -> Result<(), ChannelError> {
        if !self.state().is_connected() {
            tracing::debug!("Dropping publish to {}: channel not connected", destination);
            return Err(ChannelError::NotConnected);
        }
        if !send_command(
            &self.inner.commands,
            ChannelCommand::Send(Frame::send(destination, body)),
        ) {
            return Err(ChannelError::NotConnected);
        }
        Ok(())
    }

    pub fn publish_json<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        payload: &T,
    ) -> Result<(), ChannelError> {
        let body = serde_json::to_string(payload)?;
        self.publish(destination, body)
    }

    /// Tears the connection down. Reconnection stops until `connect` is called again.
    pub fn disconnect(&self) {
        if let Some(handle) = lock_slot(&self.inner.commands).take() {
            handle.cancelled.store(true, Ordering::SeqCst);
            let _ = handle.tx.send(ChannelCommand::Disconnect);
        }
        self.inner
            .state
            .send_replace(ChannelState::Disconnected(DisconnectReason::Requested));
        tracing::info!("Channel to {} disconnected", self.inner.url);
    }

    pub fn active_topics(&self) -> Vec<String> {
        lock(&self.inner.registry).topics()
    }
}

impl Realtime for Channel {
    fn state(&self) -> ChannelState {
        Channel::state(self)
    }

    fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError> {
        Channel::subscribe(self, topic)
    }

    fn publish(&self, destination: &str, body: String) -> Result<(), ChannelError> {
        Channel::publish(self, destination, body)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}

fn send_command(slot: &CommandSlot, command: ChannelCommand) -> bool {
    match lock_slot(slot).as_ref() {
        Some(handle) => handle.tx.send(command).is_ok(),
        None => false,
    }
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string())
}

fn tick_period(heartbeat: HeartBeat) -> Duration {
    [heartbeat.outgoing, heartbeat.incoming]
        .into_iter()
        .filter(|d| !d.is_zero())
        .min()
        .map(|d| (d / 2).max(Duration::from_millis(10)))
        .unwrap_or(Duration::from_secs(1))
}

enum Exit {
    Stop,
    Lost(DisconnectReason),
}

struct ConnectionTask {
    url: String,
    config: ChannelConfig,
    session: Session,
    state: Arc<watch::Sender<ChannelState>>,
    registry: SharedRegistry,
    slot: CommandSlot,
    cancelled: Arc<AtomicBool>,
    commands: mpsc::UnboundedReceiver<ChannelCommand>,
}

impl ConnectionTask {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ChannelState) {
        if !self.is_cancelled() {
            self.state.send_replace(state);
        }
    }

    async fn run(mut self) {
        while !self.is_cancelled() {
            self.set_state(ChannelState::Connecting);

            let reason = match self.run_session().await {
                Exit::Stop => break,
                Exit::Lost(reason) => reason,
            };
            tracing::warn!("Channel to {} lost: {:?}", self.url, reason);
            self.set_state(ChannelState::Disconnected(reason));

            if !self.config.auto_reconnect {
                break;
            }

            tracing::info!("Reconnecting in {:?}", self.config.reconnect_delay);
            if !self.wait_reconnect_delay().await {
                break;
            }
        }

        let mut slot = lock_slot(&self.slot);
        let owns_slot = slot
            .as_ref()
            .is_some_and(|handle| Arc::ptr_eq(&handle.cancelled, &self.cancelled));
        if owns_slot {
            *slot = None;
        }
        tracing::debug!("Connection task for {} stopped", self.url);
    }

    /// Returns false when a disconnect arrived during the delay.
    async fn wait_reconnect_delay(&mut self) -> bool {
        let deadline = Instant::now() + self.config.reconnect_delay;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return true,
                cmd = self.commands.recv() => match cmd {
                    Some(ChannelCommand::Send(frame)) => {
                        tracing::debug!("Dropping {} frame while offline", frame.command);
                    }
                    Some(ChannelCommand::Disconnect) | None => return false,
                },
            }
        }
    }

    async fn run_session(&mut self) -> Exit {
        let ws = match connect_async(self.url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                tracing::error!("Connection to {} failed: {}", self.url, e);
                return Exit::Lost(DisconnectReason::TransportError(e.to_string()));
            }
        };
        let (mut ws_tx, mut ws_rx) = ws.split();

        // Read per attempt so a token replaced mid-session is used on reconnect.
        let token = self.session.token();
        let requested = HeartBeat::new(
            self.config.heartbeat_outgoing,
            self.config.heartbeat_incoming,
        );
        let connect = Frame::connect(&host_of(&self.url), token.as_deref(), requested);
        if let Err(e) = ws_tx.send(Message::Text(connect.encode())).await {
            return Exit::Lost(DisconnectReason::TransportError(e.to_string()));
        }

        let mut heartbeat = HeartBeat::default();
        let mut ticker = tokio::time::interval(tick_period(heartbeat));
        let mut connected = false;
        let mut last_seen = Instant::now();
        let mut last_sent = Instant::now();

        loop {
            tokio::select! {
                msg = ws_rx.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                        Some(Ok(Message::Ping(payload))) => {
                            last_seen = Instant::now();
                            let _ = ws_tx.send(Message::Pong(payload)).await;
                            continue;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Exit::Lost(DisconnectReason::Closed);
                        }
                        Some(Err(e)) => {
                            return Exit::Lost(DisconnectReason::TransportError(e.to_string()));
                        }
                        Some(Ok(_)) => continue,
                    };
                    last_seen = Instant::now();

                    let frame = match parse_frame(&text) {
                        Ok(Inbound::Heartbeat) => continue,
                        Ok(Inbound::Frame(frame)) => frame,
                        Err(e) => {
                            tracing::warn!("Ignoring malformed frame: {}", e);
                            continue;
                        }
                    };

                    match frame.command {
                        Command::Connected => {
                            let server = HeartBeat::from_header(
                                frame.get_header("heart-beat").unwrap_or("0,0"),
                            );
                            heartbeat = HeartBeat::negotiate(requested, server);
                            ticker = tokio::time::interval(tick_period(heartbeat));

                            let subs = lock(&self.registry).wire_subscriptions();
                            for (topic, wire_id) in subs {
                                tracing::debug!("Resubscribing {} ({})", topic, wire_id);
                                let sub = Frame::subscribe(&wire_id, &topic);
                                if let Err(e) = ws_tx.send(Message::Text(sub.encode())).await {
                                    return Exit::Lost(DisconnectReason::TransportError(e.to_string()));
                                }
                            }

                            connected = true;
                            self.set_state(ChannelState::Connected);
                            tracing::info!("Channel connected to {} (heart-beat {:?})", self.url, heartbeat);
                        }
                        Command::Message => {
                            let delivered = lock(&self.registry).dispatch(
                                frame.get_header("subscription"),
                                frame.get_header("destination").unwrap_or_default(),
                                &frame.body,
                            );
                            if delivered == 0 {
                                tracing::debug!(
                                    "No listener for message on {:?}",
                                    frame.get_header("destination")
                                );
                            }
                        }
                        Command::Error => {
                            let message = frame
                                .get_header("message")
                                .map(str::to_string)
                                .unwrap_or_else(|| frame.body.clone());
                            tracing::error!("Server error on {}: {}", self.url, message);
                            return Exit::Lost(DisconnectReason::ServerError(message));
                        }
                        other => {
                            tracing::debug!("Ignoring {} frame", other);
                        }
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(ChannelCommand::Send(frame)) => {
                        if let Err(e) = ws_tx.send(Message::Text(frame.encode())).await {
                            return Exit::Lost(DisconnectReason::TransportError(e.to_string()));
                        }
                        last_sent = Instant::now();
                    }
                    Some(ChannelCommand::Disconnect) | None => {
                        let _ = ws_tx.send(Message::Text(Frame::disconnect().encode())).await;
                        let _ = ws_tx.close().await;
                        return Exit::Stop;
                    }
                },
                _ = ticker.tick() => {
                    if !connected {
                        continue;
                    }
                    if !heartbeat.outgoing.is_zero() && last_sent.elapsed() >= heartbeat.outgoing {
                        if let Err(e) = ws_tx.send(Message::Text("\n".to_string())).await {
                            return Exit::Lost(DisconnectReason::TransportError(e.to_string()));
                        }
                        last_sent = Instant::now();
                    }
                    if !heartbeat.incoming.is_zero() && last_seen.elapsed() > heartbeat.incoming * 2 {
                        return Exit::Lost(DisconnectReason::HeartbeatTimeout);
                    }
                }
            }
        }
    }
}
