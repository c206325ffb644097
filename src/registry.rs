//! Channel registry: one supervised transport per logical channel.
//!
//! [`ChannelRegistry`] owns the map of [`ChannelId`] → connection. Each live
//! channel is driven by a background *link* task that multiplexes outbound
//! frames and inbound messages over its [`Transport`] with `tokio::select!`,
//! decodes inbound frames and publishes them on the [`EventBus`].
//!
//! When a link drops unexpectedly the registry consults its
//! [`ReconnectPolicy`] and either schedules a [`RetryTimer`] or marks the
//! channel [`Failed`](ChannelStatus::Failed) and publishes a single
//! `maxReconnectAttemptsReached` event.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = ChannelRegistry::new(connector, credentials, bus.clone(), RegistryConfig::default());
//! let lobby = registry.connect(&ChannelId::Lobby).await?;
//! registry.send(&ChannelId::Lobby, &ClientMessage::GetRooms);
//! registry.disconnect(&ChannelId::Lobby);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::channel::{ChannelId, ChannelSnapshot, ChannelStatus};
use crate::credentials::{CredentialSource, Credentials};
use crate::error::{Result, SyncError};
use crate::event::{CloseReason, SyncEvent};
use crate::protocol::{encode_event, ClientMessage, ServerEvent};
use crate::supervisor::{ReconnectPolicy, RetryDecision, RetryTimer};
use crate::transport::{Connector, Transport};

/// Default bound on a single connect attempt.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`ChannelRegistry`].
///
/// # Example
///
/// ```
/// use goban_sync::registry::RegistryConfig;
/// use std::time::Duration;
///
/// let config = RegistryConfig::new()
///     .with_connect_timeout(Duration::from_secs(2))
///     .with_max_reconnect_attempts(3);
/// assert_eq!(config.reconnect.max_attempts, 3);
/// assert_eq!(config.reconnect.delay, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Upper bound on one connect attempt. Defaults to **5 seconds**.
    pub connect_timeout: Duration,
    /// Retry ceiling and delay. Defaults to **5** attempts, **1 second** apart.
    pub reconnect: ReconnectPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl RegistryConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the upper bound on a single connect attempt. A timed-out
    /// reconnect attempt counts as a failure.
    ///
    /// Defaults to **5 seconds**.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the fixed pause before each reconnect attempt.
    ///
    /// Defaults to **1 second**.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect.delay = delay;
        self
    }

    /// Set how many consecutive failures end reconnection.
    ///
    /// Defaults to **5**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect.max_attempts = attempts.max(1);
        self
    }
}

// ── Connection handle ───────────────────────────────────────────────

/// Handle to the live transport of one channel.
///
/// Cloning is cheap. The handle goes stale (see [`is_open`](Self::is_open))
/// once the link it was issued for closes; a reconnect issues a new one.
#[derive(Debug, Clone)]
pub struct Connection {
    channel: ChannelId,
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
}

impl Connection {
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// `true` when both handles refer to the same underlying transport.
    pub fn same_link(&self, other: &Connection) -> bool {
        self.channel == other.channel && self.generation == other.generation
    }

    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Queue `message` on this link.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] if the link has closed.
    pub fn send(&self, message: &ClientMessage) -> Result<()> {
        let frame = message.to_json()?;
        self.outbound
            .send(frame)
            .map_err(|_| SyncError::NotConnected(self.channel.to_string()))
    }
}

// ── Shared state ────────────────────────────────────────────────────

type Waiter = oneshot::Sender<Result<Connection>>;

/// Running link task plus the means to talk to it.
struct Link {
    outbound: mpsc::UnboundedSender<String>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Link {
    fn connection(&self, channel: &ChannelId, generation: u64) -> Connection {
        Connection {
            channel: channel.clone(),
            generation,
            outbound: self.outbound.clone(),
        }
    }

    fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Ask the link task to close its transport.
    fn close(mut self) {
        if let Some(tx) = self.shutdown.take() {
            // Err means the task already exited.
            let _ = tx.send(());
        }
    }
}

struct Entry {
    status: ChannelStatus,
    attempts: u32,
    generation: u64,
    link: Option<Link>,
    retry: Option<RetryTimer>,
    waiters: Vec<Waiter>,
}

impl Entry {
    fn new(generation: u64) -> Self {
        Self {
            status: ChannelStatus::Disconnected,
            attempts: 0,
            generation,
            link: None,
            retry: None,
            waiters: Vec::new(),
        }
    }

    fn resolve_waiters(&mut self, outcome: &Result<Connection>) {
        for waiter in self.waiters.drain(..) {
            let reply = match outcome {
                Ok(conn) => Ok(conn.clone()),
                Err(e) => Err(clone_error(e)),
            };
            // Err means that caller stopped waiting.
            let _ = waiter.send(reply);
        }
    }
}

/// Which path started a connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    Retry,
}

struct Inner {
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialSource>,
    bus: EventBus,
    config: RegistryConfig,
    generation: AtomicU64,
    channels: Mutex<HashMap<ChannelId, Entry>>,
}

// ── Registry handle ─────────────────────────────────────────────────

/// Owner of every channel's transport, retry counters and timers.
///
/// Create exactly one per application and pass clones to whatever needs it.
#[derive(Clone)]
pub struct ChannelRegistry {
    inner: Arc<Inner>,
}

impl ChannelRegistry {
    pub fn new(
        connector: impl Connector,
        credentials: impl CredentialSource,
        bus: EventBus,
        config: RegistryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector: Arc::new(connector),
                credentials: Arc::new(credentials),
                bus,
                config,
                generation: AtomicU64::new(1),
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Establish (or join, or return) the transport for `channel`.
    ///
    /// Concurrent calls for the same channel share one attempt. A call made
    /// while the channel is reconnecting resolves with that retry's outcome.
    ///
    /// # Errors
    ///
    /// - [`SyncError::MissingCredentials`] when no token/username is available
    ///   and the channel has no live connection to return
    /// - [`SyncError::Timeout`] when the attempt exceeds the connect timeout
    /// - [`SyncError::ConnectFailed`] when the connector rejects the attempt
    /// - [`SyncError::NotConnected`] when the channel is disconnected meanwhile
    pub async fn connect(&self, channel: &ChannelId) -> Result<Connection> {
        if let Some(conn) = self.inner.live_connection(channel) {
            debug!(channel = %channel, "reusing live connection");
            return Ok(conn);
        }
        let Some(credentials) = self.inner.credentials.credentials() else {
            warn!(channel = %channel, "connect refused: no credentials");
            return Err(SyncError::MissingCredentials);
        };

        let (tx, rx) = oneshot::channel();
        let start = {
            let mut channels = self.inner.lock();
            let entry = channels
                .entry(channel.clone())
                .or_insert_with(|| Entry::new(0));

            if entry.status == ChannelStatus::Connected {
                if let Some(link) = entry.link.as_ref().filter(|link| link.is_open()) {
                    debug!(channel = %channel, "reusing live connection");
                    return Ok(link.connection(channel, entry.generation));
                }
            }

            entry.waiters.push(tx);
            match entry.status {
                ChannelStatus::Disconnected | ChannelStatus::Failed => {
                    let generation = self.inner.next_generation();
                    entry.status = ChannelStatus::Connecting;
                    entry.generation = generation;
                    entry.attempts = 0;
                    entry.retry = None;
                    Some(generation)
                }
                ChannelStatus::Connecting
                | ChannelStatus::Connected
                | ChannelStatus::Reconnecting => {
                    debug!(channel = %channel, status = ?entry.status, "joining pending attempt");
                    None
                }
            }
        };

        if let Some(generation) = start {
            info!(channel = %channel, "connecting");
            tokio::spawn(Arc::clone(&self.inner).run_attempt(
                channel.clone(),
                generation,
                credentials,
                Attempt::Initial,
            ));
        }

        rx.await
            .unwrap_or_else(|_| Err(SyncError::NotConnected(channel.to_string())))
    }

    /// Tear down `channel`: close its transport, cancel any pending retry and
    /// forget its counters. Safe to call repeatedly.
    pub fn disconnect(&self, channel: &ChannelId) {
        let removed = self.inner.lock().remove(channel);
        match removed {
            Some(entry) => {
                info!(channel = %channel, "disconnecting");
                release(channel, entry);
            }
            None => debug!(channel = %channel, "disconnect: nothing to tear down"),
        }
    }

    /// [`disconnect`](Self::disconnect) every channel.
    pub fn disconnect_all(&self) {
        let drained: Vec<(ChannelId, Entry)> = self.inner.lock().drain().collect();
        info!(count = drained.len(), "disconnecting all channels");
        for (channel, entry) in drained {
            release(&channel, entry);
        }
    }

    /// Fire-and-forget send. Without a live link the message is logged and
    /// dropped; delivery is only known through a server acknowledgement.
    pub fn send(&self, channel: &ChannelId, message: &ClientMessage) {
        match message.to_json() {
            Ok(frame) => self.inner.send_frame(channel, message.event_name(), frame),
            Err(e) => error!(channel = %channel, "failed to encode {}: {e}", message.event_name()),
        }
    }

    /// Fire-and-forget send of an arbitrary named event.
    pub fn send_event(&self, channel: &ChannelId, event: &str, data: &serde_json::Value) {
        match encode_event(event, data) {
            Ok(frame) => self.inner.send_frame(channel, event, frame),
            Err(e) => error!(channel = %channel, "failed to encode {event}: {e}"),
        }
    }

    /// Current status; channels the registry does not know are `Disconnected`.
    pub fn status(&self, channel: &ChannelId) -> ChannelStatus {
        self.inner
            .lock()
            .get(channel)
            .map_or(ChannelStatus::Disconnected, |entry| entry.status)
    }

    /// Consecutive failures since the last successful connect.
    pub fn reconnect_attempts(&self, channel: &ChannelId) -> u32 {
        self.inner
            .lock()
            .get(channel)
            .map_or(0, |entry| entry.attempts)
    }

    /// Health of every known channel, sorted by id.
    pub fn channels(&self) -> Vec<ChannelSnapshot> {
        let mut snapshots: Vec<ChannelSnapshot> = self
            .inner
            .lock()
            .iter()
            .map(|(id, entry)| ChannelSnapshot {
                id: id.clone(),
                status: entry.status,
                reconnect_attempts: entry.attempts,
            })
            .collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    /// Credentials as currently provided by the source.
    pub fn credentials(&self) -> Option<Credentials> {
        self.inner.credentials.credentials()
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Release everything an entry holds. Runs outside the map lock.
fn release(channel: &ChannelId, mut entry: Entry) {
    if let Some(timer) = entry.retry.take() {
        timer.cancel();
    }
    if let Some(link) = entry.link.take() {
        link.close();
    }
    entry.resolve_waiters(&Err(SyncError::NotConnected(channel.to_string())));
}

/// Errors are not `Clone`; waiters get an equivalent.
fn clone_error(err: &SyncError) -> SyncError {
    match err {
        SyncError::Timeout => SyncError::Timeout,
        SyncError::MissingCredentials => SyncError::MissingCredentials,
        SyncError::NotConnected(channel) => SyncError::NotConnected(channel.clone()),
        other => SyncError::ConnectFailed(other.to_string()),
    }
}

/// Join frames sent first on every new link for `channel`.
fn handshake(channel: &ChannelId, username: &str) -> Vec<ClientMessage> {
    match channel {
        ChannelId::Lobby => vec![
            ClientMessage::JoinLobby {
                username: username.to_string(),
            },
            ClientMessage::GetRooms,
        ],
        ChannelId::Room(room_id) => vec![
            ClientMessage::JoinCustomRoom {
                room_id: room_id.clone(),
                username: username.to_string(),
            },
            ClientMessage::PullRoomInfo {
                room_id: room_id.clone(),
            },
        ],
        ChannelId::Match(match_id) => vec![ClientMessage::JoinGame {
            match_id: match_id.clone(),
            username: username.to_string(),
        }],
    }
}

// ── Internals ───────────────────────────────────────────────────────

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<ChannelId, Entry>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_connection(&self, channel: &ChannelId) -> Option<Connection> {
        let channels = self.lock();
        let entry = channels
            .get(channel)
            .filter(|entry| entry.status == ChannelStatus::Connected)?;
        entry
            .link
            .as_ref()
            .filter(|link| link.is_open())
            .map(|link| link.connection(channel, entry.generation))
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }

    fn publish_all(&self, events: Vec<SyncEvent>) {
        for event in events {
            self.bus.publish(&event);
        }
    }

    fn send_frame(&self, channel: &ChannelId, event: &str, frame: String) {
        let channels = self.lock();
        let queued = channels
            .get(channel)
            .and_then(|entry| entry.link.as_ref())
            .is_some_and(|link| link.outbound.send(frame).is_ok());
        if queued {
            debug!(channel = %channel, "queued {event}");
        } else {
            warn!(channel = %channel, "no live connection, dropping {event}");
        }
    }

    /// Open a transport, bounded by the connect timeout.
    async fn establish(
        &self,
        channel: &ChannelId,
        credentials: &Credentials,
    ) -> Result<Box<dyn Transport>> {
        match tokio::time::timeout(
            self.config.connect_timeout,
            self.connector.connect(channel, credentials),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout),
        }
    }

    async fn run_attempt(
        self: Arc<Self>,
        channel: ChannelId,
        generation: u64,
        credentials: Credentials,
        attempt: Attempt,
    ) {
        let outcome = self.establish(&channel, &credentials).await;
        self.complete_attempt(&channel, generation, &credentials, attempt, outcome);
    }

    fn complete_attempt(
        self: &Arc<Self>,
        channel: &ChannelId,
        generation: u64,
        credentials: &Credentials,
        attempt: Attempt,
        outcome: Result<Box<dyn Transport>>,
    ) {
        let mut events = Vec::new();
        {
            let mut channels = self.lock();
            let Some(entry) = channels
                .get_mut(channel)
                .filter(|entry| entry.generation == generation)
            else {
                debug!(channel = %channel, "attempt outlived its channel, discarding");
                if let Ok(mut transport) = outcome {
                    tokio::spawn(async move {
                        let _ = transport.close().await;
                    });
                }
                return;
            };

            match outcome {
                Ok(transport) => {
                    let link =
                        self.spawn_link(channel.clone(), generation, transport, &credentials.username);
                    let conn = link.connection(channel, generation);
                    entry.link = Some(link);
                    entry.status = ChannelStatus::Connected;
                    entry.attempts = 0;
                    entry.resolve_waiters(&Ok(conn));
                    info!(channel = %channel, ?attempt, "connected");
                    events.push(SyncEvent::Connected {
                        channel: channel.clone(),
                    });
                }
                Err(err) => {
                    warn!(channel = %channel, ?attempt, "connect attempt failed: {err}");
                    entry.resolve_waiters(&Err(clone_error(&err)));
                    events.push(SyncEvent::Error {
                        channel: channel.clone(),
                        message: err.to_string(),
                    });
                    match attempt {
                        Attempt::Initial => {
                            channels.remove(channel);
                        }
                        Attempt::Retry => self.record_failure(channel, entry, &mut events),
                    }
                }
            }
        }
        self.publish_all(events);
    }

    /// Count one more consecutive failure and either schedule a retry or give up.
    fn record_failure(self: &Arc<Self>, channel: &ChannelId, entry: &mut Entry, events: &mut Vec<SyncEvent>) {
        entry.link = None;
        entry.attempts += 1;
        match self.config.reconnect.on_failure(entry.attempts) {
            RetryDecision::GiveUp { attempts } => {
                warn!(channel = %channel, attempts, "max reconnect attempts reached");
                entry.status = ChannelStatus::Failed;
                entry.retry = None;
                entry.resolve_waiters(&Err(SyncError::ConnectFailed(format!(
                    "gave up after {attempts} attempts"
                ))));
                events.push(SyncEvent::MaxReconnectAttemptsReached {
                    channel: channel.clone(),
                    attempts,
                });
            }
            RetryDecision::Retry { attempt, delay } => {
                info!(
                    channel = %channel,
                    attempt,
                    max = self.config.reconnect.max_attempts,
                    "reconnecting in {delay:?}"
                );
                entry.status = ChannelStatus::Reconnecting;
                let registry = Arc::downgrade(self);
                let channel = channel.clone();
                let generation = entry.generation;
                entry.retry = Some(RetryTimer::schedule(delay, async move {
                    if let Some(inner) = registry.upgrade() {
                        inner.retry(channel, generation).await;
                    }
                }));
            }
        }
    }

    /// Fired by a [`RetryTimer`].
    async fn retry(self: Arc<Self>, channel: ChannelId, generation: u64) {
        let credentials = self.credentials.credentials();
        let mut events = Vec::new();
        let next = {
            let mut channels = self.lock();
            let Some(entry) = channels.get_mut(&channel).filter(|entry| {
                entry.generation == generation && entry.status == ChannelStatus::Reconnecting
            }) else {
                debug!(channel = %channel, "retry is stale, skipping");
                return;
            };
            if let Some(timer) = entry.retry.take() {
                timer.disarm();
            }

            match credentials {
                Some(credentials) => {
                    let next = self.next_generation();
                    entry.generation = next;
                    Some((next, credentials))
                }
                None => {
                    warn!(channel = %channel, "credentials gone, abandoning reconnect");
                    entry.status = ChannelStatus::Failed;
                    entry.resolve_waiters(&Err(SyncError::MissingCredentials));
                    events.push(SyncEvent::Error {
                        channel: channel.clone(),
                        message: SyncError::MissingCredentials.to_string(),
                    });
                    None
                }
            }
        };

        let Some((generation, credentials)) = next else {
            self.publish_all(events);
            return;
        };

        debug!(channel = %channel, "retrying connect");
        self.run_attempt(channel, generation, credentials, Attempt::Retry)
            .await;
    }

    fn spawn_link(
        self: &Arc<Self>,
        channel: ChannelId,
        generation: u64,
        transport: Box<dyn Transport>,
        username: &str,
    ) -> Link {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        for message in handshake(&channel, username) {
            match message.to_json() {
                // Cannot fail: the receiver is alive until the task below drops it.
                Ok(frame) => {
                    let _ = outbound_tx.send(frame);
                }
                Err(e) => error!(channel = %channel, "failed to encode handshake: {e}"),
            }
        }
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(link_loop(
            Arc::downgrade(self),
            channel,
            generation,
            transport,
            outbound_rx,
            shutdown_rx,
        ));
        Link {
            outbound: outbound_tx,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Called by a link task once, when its transport is gone.
    fn on_link_closed(self: &Arc<Self>, channel: &ChannelId, generation: u64, reason: CloseReason) {
        let mut events = vec![SyncEvent::Disconnected {
            channel: channel.clone(),
            reason: reason.clone(),
        }];
        {
            let mut channels = self.lock();
            match channels
                .get_mut(channel)
                .filter(|entry| entry.generation == generation)
            {
                None => {
                    // Entry already removed by `disconnect`: only report local closes.
                    if reason != CloseReason::Local {
                        debug!(channel = %channel, "stale link close ignored");
                        return;
                    }
                }
                Some(entry) if reason.is_retryable() => {
                    self.record_failure(channel, entry, &mut events);
                }
                Some(_) => {
                    info!(channel = %channel, ?reason, "channel closed, not retrying");
                    channels.remove(channel);
                }
            }
        }
        self.publish_all(events);
    }
}

/// Per-channel link task: drains the outbound queue into the transport and
/// publishes decoded inbound frames until the transport or the registry goes away.
async fn link_loop(
    registry: Weak<Inner>,
    channel: ChannelId,
    generation: u64,
    mut transport: Box<dyn Transport>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(channel = %channel, generation, "link started");

    let reason = loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = transport.send(frame).await {
                            error!(channel = %channel, "transport send error: {e}");
                            break CloseReason::Unexpected(format!("transport send error: {e}"));
                        }
                    }
                    // Every sender dropped: the registry released this link.
                    None => {
                        let _ = transport.close().await;
                        break CloseReason::Local;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                debug!(channel = %channel, "link shutdown requested");
                // Flush what was queued before the shutdown.
                while let Ok(frame) = outbound_rx.try_recv() {
                    if transport.send(frame).await.is_err() {
                        break;
                    }
                }
                let _ = transport.close().await;
                break CloseReason::Local;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => match ServerEvent::from_json(&text) {
                        Ok(event) => {
                            let Some(inner) = registry.upgrade() else {
                                break CloseReason::Local;
                            };
                            debug!(channel = %channel, event = %event.name(), "received");
                            inner.bus.publish(&SyncEvent::Server {
                                channel: channel.clone(),
                                event,
                            });
                        }
                        Err(e) => {
                            warn!(channel = %channel, "dropping undecodable frame: {e}, raw: {text}");
                        }
                    },
                    Some(Err(e)) => {
                        error!(channel = %channel, "transport receive error: {e}");
                        break CloseReason::Unexpected(format!("transport receive error: {e}"));
                    }
                    None => {
                        debug!(channel = %channel, "transport closed by server");
                        break CloseReason::Server;
                    }
                }
            }
        }
    };

    debug!(channel = %channel, ?reason, "link exited");
    drop(outbound_rx);
    if let Some(inner) = registry.upgrade() {
        inner.on_link_closed(&channel, generation, reason);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.delay, Duration::from_secs(1));
    }

    #[test]
    fn max_attempts_is_clamped_to_one() {
        let config = RegistryConfig::new().with_max_reconnect_attempts(0);
        assert_eq!(config.reconnect.max_attempts, 1);
    }

    #[test]
    fn handshake_per_channel_kind() {
        let names = |id: ChannelId| -> Vec<&'static str> {
            handshake(&id, "alice")
                .iter()
                .map(ClientMessage::event_name)
                .collect()
        };
        assert_eq!(names(ChannelId::Lobby), vec!["join_lobby", "get_rooms"]);
        assert_eq!(
            names(ChannelId::room("r1")),
            vec!["join_custom_room", "pull_room_info"]
        );
        assert_eq!(names(ChannelId::match_("m1")), vec!["joinGame"]);
    }

    #[test]
    fn waiter_errors_keep_their_kind() {
        assert!(matches!(clone_error(&SyncError::Timeout), SyncError::Timeout));
        assert!(matches!(
            clone_error(&SyncError::MissingCredentials),
            SyncError::MissingCredentials
        ));
        assert!(matches!(
            clone_error(&SyncError::TransportClosed),
            SyncError::ConnectFailed(_)
        ));
    }
}
