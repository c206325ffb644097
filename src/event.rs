//! Events delivered through the [`EventBus`](crate::bus::EventBus).

use std::fmt;

use crate::channel::ChannelId;
use crate::protocol::ServerEvent;

/// Name under which handlers subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    RoomUpdate,
    LobbyUpdate,
    GameUpdate,
    ReadyStateUpdate,
    RoomDeleted,
    GameError,
    Connect,
    Disconnect,
    Error,
    MaxReconnectAttemptsReached,
}

impl EventName {
    /// Wire spelling of the name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::RoomUpdate => "room_update",
            EventName::LobbyUpdate => "lobby_update",
            EventName::GameUpdate => "game_update",
            EventName::ReadyStateUpdate => "readyStateUpdate",
            EventName::RoomDeleted => "room_deleted",
            EventName::GameError => "game_error",
            EventName::Connect => "connect",
            EventName::Disconnect => "disconnect",
            EventName::Error => "error",
            EventName::MaxReconnectAttemptsReached => "maxReconnectAttemptsReached",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a channel's transport went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `disconnect` was called locally.
    Local,
    /// The server closed the connection on purpose.
    Server,
    /// The connection broke. The supervisor will retry.
    Unexpected(String),
}

impl CloseReason {
    /// Only unexpected closes are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CloseReason::Unexpected(_))
    }
}

/// Everything the bus can carry: decoded server events plus channel lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A transport for `channel` is up (first connect or reconnect).
    Connected { channel: ChannelId },
    /// A transport for `channel` went away.
    Disconnected {
        channel: ChannelId,
        reason: CloseReason,
    },
    /// A connect attempt failed or credentials were missing.
    Error { channel: ChannelId, message: String },
    /// Terminal: the retry ceiling was hit. Published once per failure.
    MaxReconnectAttemptsReached { channel: ChannelId, attempts: u32 },
    /// A decoded server event received on `channel`.
    Server {
        channel: ChannelId,
        event: ServerEvent,
    },
}

impl SyncEvent {
    pub fn name(&self) -> EventName {
        match self {
            SyncEvent::Connected { .. } => EventName::Connect,
            SyncEvent::Disconnected { .. } => EventName::Disconnect,
            SyncEvent::Error { .. } => EventName::Error,
            SyncEvent::MaxReconnectAttemptsReached { .. } => {
                EventName::MaxReconnectAttemptsReached
            }
            SyncEvent::Server { event, .. } => event.name(),
        }
    }

    /// Channel that produced the event.
    pub fn channel(&self) -> &ChannelId {
        match self {
            SyncEvent::Connected { channel }
            | SyncEvent::Disconnected { channel, .. }
            | SyncEvent::Error { channel, .. }
            | SyncEvent::MaxReconnectAttemptsReached { channel, .. }
            | SyncEvent::Server { channel, .. } => channel,
        }
    }
}
