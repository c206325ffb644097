//! Logical channel identifiers and health.

use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// One logical communication line multiplexed over the realtime transport.
///
/// The textual form is `lobby`, `room:<roomId>` or `match:<matchId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelId {
    /// The global lobby.
    Lobby,
    /// A pre-game room.
    Room(String),
    /// A live match.
    Match(String),
}

impl ChannelId {
    pub fn room(room_id: impl Into<String>) -> Self {
        ChannelId::Room(room_id.into())
    }

    pub fn match_(match_id: impl Into<String>) -> Self {
        ChannelId::Match(match_id.into())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Lobby => f.write_str("lobby"),
            ChannelId::Room(id) => write!(f, "room:{id}"),
            ChannelId::Match(id) => write!(f, "match:{id}"),
        }
    }
}

impl FromStr for ChannelId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "lobby" {
            return Ok(ChannelId::Lobby);
        }
        match s.split_once(':') {
            Some(("room", id)) if !id.is_empty() => Ok(ChannelId::Room(id.to_string())),
            Some(("match", id)) if !id.is_empty() => Ok(ChannelId::Match(id.to_string())),
            _ => Err(SyncError::InvalidChannelId(s.to_string())),
        }
    }
}

/// Connection status of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    /// No transport and nothing pending.
    #[default]
    Disconnected,
    /// First connect attempt in flight.
    Connecting,
    /// A live transport is attached.
    Connected,
    /// The transport dropped; a retry is scheduled or in flight.
    Reconnecting,
    /// Retries exhausted (or credentials vanished). Terminal until the next
    /// explicit connect.
    Failed,
}

/// Point-in-time view of one channel's health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub status: ChannelStatus,
    pub reconnect_attempts: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        for id in [
            ChannelId::Lobby,
            ChannelId::room("r-1"),
            ChannelId::match_("m:42"),
        ] {
            let text = id.to_string();
            assert_eq!(text.parse::<ChannelId>().unwrap(), id);
        }
    }

    #[test]
    fn match_ids_may_contain_colons() {
        let id: ChannelId = "match:a:b".parse().unwrap();
        assert_eq!(id, ChannelId::match_("a:b"));
    }

    #[test]
    fn rejects_unknown_prefixes_and_empty_ids() {
        for bad in ["", "lobby:1", "room:", "match:", "game:7", "Lobby"] {
            let err = bad.parse::<ChannelId>().unwrap_err();
            assert!(matches!(err, SyncError::InvalidChannelId(_)), "{bad}");
        }
    }
}
