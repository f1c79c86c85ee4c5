//! Live channel client.
//!
//! Owns at most one STOMP-over-WebSocket session, scoped to a single user.
//! The session runs as a background task:
//!   1. Connect the socket and perform the STOMP `CONNECT` handshake
//!   2. Subscribe once to the user's notification destination
//!   3. Decode each `MESSAGE` and hand it to the handler inline
//!   4. On any transport failure, wait a fixed delay and start over
//!
//! `disconnect()` (or a superseding `connect()`) unsubscribes, sends
//! `DISCONNECT`, closes the socket and waits for the task to finish, so the
//! old handler never sees another event once it returns.

use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use super::stomp::{decode_frames, Command, Frame, Heartbeat, HEARTBEAT};
use crate::api::TokenProvider;
use crate::errors::{NotifyError, Result};
use crate::models::Notification;

/// Only one subscription ever exists per session.
const SUBSCRIPTION_ID: &str = "sub-0";

/// Upper bound on the polite goodbye before the session task is aborted.
const GRACEFUL_CLOSE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint of the STOMP broker.
    pub url: String,
    /// Destination template; `{user}` is replaced by the user key.
    pub destination: String,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Heart-beats we offer; the broker may widen them.
    pub heartbeat: Heartbeat,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws/websocket".to_string(),
            destination: "/user/{user}/queue/notifications".to_string(),
            reconnect_delay: Duration::from_millis(5000),
            heartbeat: Heartbeat::new(Duration::from_millis(4000), Duration::from_millis(4000)),
        }
    }
}

impl ChannelConfig {
    pub fn destination_for(&self, user_key: &str) -> String {
        self.destination.replace("{user}", user_key)
    }

    fn host(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

pub type EventHandler = Arc<dyn Fn(Notification) + Send + Sync>;

pub struct LiveChannel {
    config: ChannelConfig,
    tokens: Arc<dyn TokenProvider>,
    state: Arc<watch::Sender<ChannelState>>,
    session: Mutex<Option<ChannelSession>>,
}

struct ChannelSession {
    user_key: String,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ChannelSession {
    async fn close(self) {
        let ChannelSession {
            user_key,
            shutdown,
            mut task,
        } = self;

        let _ = shutdown.send(());
        match tokio::time::timeout(GRACEFUL_CLOSE, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_panic() => {
                error!(user = %user_key, "live channel task panicked: {}", e);
            }
            Ok(Err(_)) => {}
            Err(_) => {
                warn!(user = %user_key, "live channel did not close in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }
    }
}

impl LiveChannel {
    pub fn new(config: ChannelConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            config,
            tokens,
            state: Arc::new(state),
            session: Mutex::new(None),
        }
    }

    /// Start (or restart) the session for `user_key`. Any existing session,
    /// whoever it belongs to, is fully torn down first.
    pub async fn connect<F>(&self, user_key: &str, on_event: F)
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        let mut slot = self.session.lock().await;
        if let Some(previous) = slot.take() {
            debug!(
                previous = %previous.user_key,
                next = %user_key,
                "superseding live channel session"
            );
            previous.close().await;
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.state.send_replace(ChannelState::Connecting);

        let runner = SessionRunner {
            url: self.config.url.clone(),
            host: self.config.host(),
            destination: self.config.destination_for(user_key),
            reconnect_delay: self.config.reconnect_delay,
            heartbeat: self.config.heartbeat,
            tokens: self.tokens.clone(),
            user_key: user_key.to_string(),
            handler: Arc::new(on_event),
            state: self.state.clone(),
        };
        let task = tokio::spawn(runner.run(shutdown_rx));

        info!(user = %user_key, url = %self.config.url, "live channel session started");
        *slot = Some(ChannelSession {
            user_key: user_key.to_string(),
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Tear down the current session. Safe to call repeatedly, before any
    /// `connect()`, and while a reconnect backoff is pending.
    pub async fn disconnect(&self) {
        let mut slot = self.session.lock().await;
        match slot.take() {
            Some(session) => {
                let user = session.user_key.clone();
                session.close().await;
                info!(user = %user, "live channel session closed");
            }
            None => debug!("live channel disconnect with no active session"),
        }
        self.state.send_replace(ChannelState::Disconnected);
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// The user the current session belongs to, if any.
    pub async fn user_key(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.user_key.clone())
    }
}

enum Exit {
    Shutdown,
}

struct SessionRunner {
    url: String,
    host: String,
    destination: String,
    reconnect_delay: Duration,
    heartbeat: Heartbeat,
    tokens: Arc<dyn TokenProvider>,
    user_key: String,
    handler: EventHandler,
    state: Arc<watch::Sender<ChannelState>>,
}

impl SessionRunner {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.state.send_replace(ChannelState::Connecting);

            match self.run_connection(&mut shutdown).await {
                Ok(Exit::Shutdown) => break,
                Err(e) if e.is_transport() => {
                    warn!(
                        user = %self.user_key,
                        attempt,
                        error = %e,
                        delay_ms = self.reconnect_delay.as_millis() as u64,
                        "live channel lost, reconnecting"
                    );
                }
                Err(e) => {
                    error!(
                        user = %self.user_key,
                        attempt,
                        error = %e,
                        "live channel failed, reconnecting"
                    );
                }
            }

            self.state.send_replace(ChannelState::Disconnected);
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = &mut shutdown => break,
            }
        }

        self.state.send_replace(ChannelState::Disconnected);
        debug!(user = %self.user_key, "live channel task finished");
    }

    async fn run_connection(&self, shutdown: &mut oneshot::Receiver<()>) -> Result<Exit> {
        let (ws, _resp) = tokio::select! {
            res = connect_async(self.url.as_str()) => res?,
            _ = &mut *shutdown => return Ok(Exit::Shutdown),
        };
        let (mut sink, mut stream) = ws.split();

        let token = self.tokens.bearer_token();
        let connect = Frame::connect(&self.host, self.heartbeat, token.as_deref());
        sink.send(Message::Text(connect.encode())).await?;

        let server_heartbeat = tokio::select! {
            res = await_connected(&mut stream) => res?,
            _ = &mut *shutdown => {
                let _ = sink.close().await;
                return Ok(Exit::Shutdown);
            }
        };
        let heartbeat = Heartbeat::negotiate(self.heartbeat, server_heartbeat);

        let subscribe = Frame::subscribe(SUBSCRIPTION_ID, &self.destination);
        sink.send(Message::Text(subscribe.encode())).await?;

        self.state.send_replace(ChannelState::Connected);
        info!(
            user = %self.user_key,
            destination = %self.destination,
            heartbeat_out_ms = heartbeat.outgoing.as_millis() as u64,
            heartbeat_in_ms = heartbeat.incoming.as_millis() as u64,
            "live channel subscribed"
        );

        let send_beats = !heartbeat.outgoing.is_zero();
        let mut beat = tokio::time::interval(if send_beats {
            heartbeat.outgoing
        } else {
            Duration::from_secs(3600)
        });
        beat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        beat.tick().await;

        // Broker counts as gone after two silent incoming intervals.
        let grace = heartbeat.incoming.checked_mul(2).unwrap_or(Duration::ZERO);
        let watch_liveness = !grace.is_zero();
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    goodbye(&mut sink).await;
                    return Ok(Exit::Shutdown);
                }
                _ = beat.tick(), if send_beats => {
                    sink.send(Message::Text(HEARTBEAT.to_string())).await?;
                }
                _ = tokio::time::sleep_until(deadline(last_seen, grace)), if watch_liveness => {
                    return Err(NotifyError::HeartbeatTimeout(grace));
                }
                msg = stream.next() => {
                    let msg = match msg {
                        Some(m) => m?,
                        None => return Err(NotifyError::ConnectionClosed),
                    };
                    last_seen = Instant::now();

                    match msg {
                        Message::Text(text) => self.dispatch(&text)?,
                        Message::Binary(bytes) => match String::from_utf8(bytes) {
                            Ok(text) => self.dispatch(&text)?,
                            Err(_) => warn!(user = %self.user_key, "dropping non-UTF-8 binary message"),
                        },
                        Message::Close(frame) => {
                            debug!(user = %self.user_key, ?frame, "broker closed the socket");
                            return Err(NotifyError::ConnectionClosed);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Hand every decodable notification to the handler. Malformed payloads
    /// are dropped; only a broker `ERROR` frame ends the connection.
    fn dispatch(&self, text: &str) -> Result<()> {
        let frames = match decode_frames(text) {
            Ok(frames) => frames,
            Err(e) => {
                warn!(user = %self.user_key, error = %e, "dropping undecodable STOMP message");
                return Ok(());
            }
        };

        for frame in frames {
            match frame.command {
                Command::Message => {
                    if let Some(sub) = frame.get("subscription") {
                        if sub != SUBSCRIPTION_ID {
                            debug!(subscription = %sub, "ignoring message for foreign subscription");
                            continue;
                        }
                    }
                    match Notification::from_json(&frame.body) {
                        Ok(notification) => {
                            debug!(user = %self.user_key, id = %notification.id, "notification pushed");
                            (self.handler)(notification);
                        }
                        Err(e) => {
                            warn!(user = %self.user_key, error = %e, "dropping malformed notification payload");
                        }
                    }
                }
                Command::Error => return Err(NotifyError::Broker(broker_error(&frame))),
                other => debug!(command = %other, "ignoring STOMP frame"),
            }
        }
        Ok(())
    }
}

/// Read until the broker answers `CONNECTED` and return its heart-beat offer.
async fn await_connected<S>(stream: &mut S) -> Result<Heartbeat>
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = stream.next().await {
        let text = match msg? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(NotifyError::ConnectionClosed),
            _ => continue,
        };
        for frame in decode_frames(&text)? {
            match frame.command {
                Command::Connected => {
                    return match frame.get("heart-beat") {
                        Some(value) => Ok(Heartbeat::parse(value)?),
                        None => Ok(Heartbeat::default()),
                    };
                }
                Command::Error => return Err(NotifyError::Broker(broker_error(&frame))),
                _ => {}
            }
        }
    }
    Err(NotifyError::ConnectionClosed)
}

/// Unsubscribe first, then deactivate. Failures only mean the socket is
/// already gone.
async fn goodbye<K>(sink: &mut K)
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    let frames = [Frame::unsubscribe(SUBSCRIPTION_ID), Frame::disconnect()];
    for frame in frames {
        if let Err(e) = sink.send(Message::Text(frame.encode())).await {
            debug!(error = %e, "goodbye frame not sent");
            return;
        }
    }
    let _ = sink.close().await;
}

/// Far-future instants are clamped instead of overflowing.
fn deadline(last_seen: Instant, grace: Duration) -> Instant {
    last_seen
        .checked_add(grace)
        .unwrap_or_else(|| last_seen + Duration::from_secs(86_400 * 365))
}

fn broker_error(frame: &Frame) -> String {
    match frame.get("message") {
        Some(msg) if !msg.is_empty() => msg.to_string(),
        _ => frame.body.trim().to_string(),
    }
}
