#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Shared test utilities for goban-sync integration tests.
//!
//! Provides a channel-driven [`MockTransport`], a scripted [`MockConnector`]
//! that hands out one [`MockServer`] handle per accepted connection, and
//! helpers for building server event JSON.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use goban_sync::{
    ChannelId, ChannelRegistry, Connector, Credentials, EventBus, EventName, EventStream,
    RegistryConfig, StaticCredentials, SyncError, SyncEvent, Transport,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

// ── MockTransport ───────────────────────────────────────────────────

/// What the fake server does next.
#[derive(Debug)]
pub enum Frame {
    Text(String),
    /// Break the connection (retryable).
    Fail(String),
    /// Close the connection on purpose (not retried).
    Close,
}

/// A transport whose inbound side is fed by a [`MockServer`].
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Frame>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), SyncError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::TransportClosed);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, SyncError>> {
        match self.incoming.recv().await {
            Some(Frame::Text(text)) => Some(Ok(text)),
            Some(Frame::Fail(reason)) => Some(Err(SyncError::TransportReceive(reason))),
            Some(Frame::Close) => None,
            // Server handle dropped: stay open until shutdown.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), SyncError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Test-side handle to one accepted connection.
#[derive(Clone)]
pub struct MockServer {
    pub channel: ChannelId,
    to_client: mpsc::UnboundedSender<Frame>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockServer {
    /// Deliver a text frame to the client.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.to_client.send(Frame::Text(text.into()));
    }

    /// Break the connection.
    pub fn fail(&self, reason: &str) {
        let _ = self.to_client.send(Frame::Fail(reason.to_string()));
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        let _ = self.to_client.send(Frame::Close);
    }

    /// Raw frames the client sent.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Event names of the frames the client sent, in order.
    pub fn sent_events(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|frame| {
                let value: Value = serde_json::from_str(frame).unwrap();
                value["event"].as_str().unwrap().to_string()
            })
            .collect()
    }

    /// Payload of the last frame named `event`.
    pub fn last_sent(&self, event: &str) -> Option<Value> {
        self.sent()
            .iter()
            .map(|frame| serde_json::from_str::<Value>(frame).unwrap())
            .filter(|value| value["event"] == event)
            .last()
            .map(|value| value["data"].clone())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Scripted result of one connect call.
#[derive(Debug, Clone)]
pub enum Outcome {
    Accept,
    Reject(String),
    /// Never completes; the registry's timeout must fire.
    Hang,
    /// Accept after a pause.
    Delay(Duration),
}

#[derive(Default)]
struct ConnectorState {
    script: StdMutex<VecDeque<Outcome>>,
    calls: AtomicUsize,
    servers: StdMutex<Vec<MockServer>>,
}

/// Connector that follows a script and accepts once the script runs out.
///
/// Clones share state, so keep one in the test and hand one to the registry.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<ConnectorState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(outcomes: Vec<Outcome>) -> Self {
        let connector = Self::new();
        connector.state.script.lock().unwrap().extend(outcomes);
        connector
    }

    pub fn push(&self, outcome: Outcome) {
        self.state.script.lock().unwrap().push_back(outcome);
    }

    /// Number of connect calls so far.
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn servers(&self) -> Vec<MockServer> {
        self.state.servers.lock().unwrap().clone()
    }

    /// Most recent connection for `channel`.
    pub fn server(&self, channel: &ChannelId) -> MockServer {
        self.servers()
            .into_iter()
            .rev()
            .find(|s| &s.channel == channel)
            .unwrap_or_else(|| panic!("no connection accepted for {channel}"))
    }

    fn accept(&self, channel: &ChannelId) -> Box<dyn Transport> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        self.state.servers.lock().unwrap().push(MockServer {
            channel: channel.clone(),
            to_client: tx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        });
        Box::new(MockTransport {
            incoming: rx,
            sent,
            closed,
        })
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        channel: &ChannelId,
        _credentials: &Credentials,
    ) -> Result<Box<dyn Transport>, SyncError> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Accept);
        match outcome {
            Outcome::Accept => Ok(self.accept(channel)),
            Outcome::Reject(reason) => Err(SyncError::ConnectFailed(reason)),
            Outcome::Hang => std::future::pending().await,
            Outcome::Delay(pause) => {
                tokio::time::sleep(pause).await;
                Ok(self.accept(channel))
            }
        }
    }
}

// ── Setup helpers ───────────────────────────────────────────────────

pub fn alice() -> StaticCredentials {
    StaticCredentials::new(Credentials::new("token-alice", "alice"))
}

/// Registry logged in as `alice` with default settings.
pub fn registry(connector: &MockConnector) -> ChannelRegistry {
    registry_with(connector, alice())
}

pub fn registry_with(connector: &MockConnector, credentials: StaticCredentials) -> ChannelRegistry {
    ChannelRegistry::new(
        connector.clone(),
        credentials,
        EventBus::new(),
        RegistryConfig::default(),
    )
}

/// Let spawned link tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Wait for the next event on `stream` named `name`, skipping others.
pub async fn next_named(stream: &mut EventStream, name: EventName) -> SyncEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(60), stream.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
            .expect("event stream closed");
        if event.name() == name {
            return event;
        }
    }
}

// ── JSON helper functions ───────────────────────────────────────────

fn envelope(event: &str, data: Value) -> String {
    json!({ "event": event, "data": data }).to_string()
}

pub fn players_json(names: &[&str]) -> Value {
    Value::Array(names.iter().map(|n| json!({ "username": n })).collect())
}

/// `room_update` without a `ready` map.
pub fn room_update_json(room_id: &str, players: &[&str]) -> String {
    envelope(
        "room_update",
        json!({ "room_id": room_id, "data": { "players": players_json(players), "started": false } }),
    )
}

/// `room_update` for a started two-player room.
pub fn room_started_json(room_id: &str, players: &[&str], match_id: &str) -> String {
    envelope(
        "room_update",
        json!({
            "room_id": room_id,
            "data": {
                "players": players_json(players),
                "started": true,
                "match_id": match_id,
            }
        }),
    )
}

pub fn lobby_update_json(rooms: &[(&str, &[&str])]) -> String {
    let rooms: Vec<Value> = rooms
        .iter()
        .map(|(id, players)| json!({ "room_id": id, "players": players_json(players) }))
        .collect();
    envelope("lobby_update", json!({ "rooms": rooms }))
}

pub fn ready_state_json(room_id: &str, username: &str, ready: bool) -> String {
    envelope(
        "readyStateUpdate",
        json!({ "room_id": room_id, "username": username, "ready": ready }),
    )
}

pub fn room_deleted_json(room_id: &str) -> String {
    envelope("room_deleted", json!({ "room_id": room_id }))
}

pub fn game_error_json(message: &str) -> String {
    envelope("game_error", json!({ "message": message }))
}

/// A `size`×`size` board with `stones` placed as `(x, y, "black" | "white")`.
pub fn board_json(size: usize, stones: &[(usize, usize, &str)]) -> Value {
    let mut rows = vec![vec![Value::Null; size]; size];
    for (x, y, color) in stones {
        rows[*x][*y] = json!(color);
    }
    json!(rows)
}

/// `game_update` with default timers omitted.
pub fn game_update_json(
    match_id: &str,
    stones: &[(usize, usize, &str)],
    current_player: &str,
    history_length: u32,
) -> String {
    envelope(
        "game_update",
        json!({
            "match_id": match_id,
            "board": board_json(19, stones),
            "current_player": current_player,
            "passes": 0,
            "captured": { "black": 0, "white": 0 },
            "game_over": false,
            "winner": null,
            "history_length": history_length,
        }),
    )
}

/// `game_update` carrying explicit timers as `(main, byo_yomi, periods)`.
pub fn game_update_with_timers_json(
    match_id: &str,
    history_length: u32,
    black: (u32, u32, u32),
    white: (u32, u32, u32),
) -> String {
    let timer = |(main_time, byo_yomi, periods): (u32, u32, u32)| {
        json!({ "main_time": main_time, "byo_yomi": byo_yomi, "periods": periods })
    };
    envelope(
        "game_update",
        json!({
            "match_id": match_id,
            "board": board_json(19, &[]),
            "current_player": "black",
            "history_length": history_length,
            "black_timer": timer(black),
            "white_timer": timer(white),
        }),
    )
}
