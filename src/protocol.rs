//! Wire types exchanged with the game server.
//!
//! Every frame is a JSON text message shaped as an envelope:
//!
//! ```json
//! {"event": "game_update", "data": {"match_id": "m1", "board": [[null, "black"], [null, null]]}}
//! ```
//!
//! Board cells are `null` (empty), `"black"` or `"white"`. Fields the server
//! may omit are modeled as `Option` or `#[serde(default)]`; deciding what a
//! missing field means is the reducers' job, not the decoder's.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::EventName;

// ── Stones and boards ───────────────────────────────────────────────

/// A player color.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stone {
    #[default]
    Black,
    White,
}

impl Stone {
    pub fn opponent(self) -> Stone {
        match self {
            Stone::Black => Stone::White,
            Stone::White => Stone::Black,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stone::Black => "black",
            Stone::White => "white",
        }
    }

    /// Capitalized name used in result strings.
    pub fn title(self) -> &'static str {
        match self {
            Stone::Black => "Black",
            Stone::White => "White",
        }
    }
}

impl fmt::Display for Stone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of one intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Empty,
    Black,
    White,
}

impl Cell {
    pub fn stone(self) -> Option<Stone> {
        match self {
            Cell::Empty => None,
            Cell::Black => Some(Stone::Black),
            Cell::White => Some(Stone::White),
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

impl From<Option<Stone>> for Cell {
    fn from(stone: Option<Stone>) -> Self {
        match stone {
            None => Cell::Empty,
            Some(Stone::Black) => Cell::Black,
            Some(Stone::White) => Cell::White,
        }
    }
}

impl From<Stone> for Cell {
    fn from(stone: Stone) -> Self {
        Cell::from(Some(stone))
    }
}

/// An N×N grid indexed as `board[x][y]` (`x` is the row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "Vec<Vec<Option<Stone>>>", into = "Vec<Vec<Option<Stone>>>")]
pub struct Board {
    rows: Vec<Vec<Cell>>,
}

impl Board {
    /// An all-empty `size`×`size` board.
    pub fn empty(size: usize) -> Self {
        Self {
            rows: vec![vec![Cell::Empty; size]; size],
        }
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// `true` when the grid is non-empty and every row has `size()` cells.
    pub fn is_square(&self) -> bool {
        let n = self.rows.len();
        n > 0 && self.rows.iter().all(|row| row.len() == n)
    }

    /// Cell at `(x, y)`, or `None` when off the board.
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        self.rows.get(x).and_then(|row| row.get(y)).copied()
    }

    /// Return a copy with `stone` placed at `(x, y)`. Off-board writes are ignored.
    #[must_use]
    pub fn with_stone(mut self, x: usize, y: usize, stone: Stone) -> Self {
        if let Some(cell) = self.rows.get_mut(x).and_then(|row| row.get_mut(y)) {
            *cell = Cell::from(stone);
        }
        self
    }

    /// Stones present in `next` at points that are empty or differently
    /// colored in `self`.
    pub fn placed_in(&self, next: &Board) -> Vec<(usize, usize, Stone)> {
        let mut placed = Vec::new();
        for (x, row) in next.rows.iter().enumerate() {
            for (y, cell) in row.iter().enumerate() {
                if let Some(stone) = cell.stone() {
                    if self.get(x, y) != Some(*cell) {
                        placed.push((x, y, stone));
                    }
                }
            }
        }
        placed
    }
}

impl From<Vec<Vec<Option<Stone>>>> for Board {
    fn from(rows: Vec<Vec<Option<Stone>>>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Cell::from).collect())
                .collect(),
        }
    }
}

impl From<Board> for Vec<Vec<Option<Stone>>> {
    fn from(board: Board) -> Self {
        board
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(Cell::stone).collect())
            .collect()
    }
}

// ── Game payloads ───────────────────────────────────────────────────

/// Captured stone counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Captured {
    #[serde(default)]
    pub black: u32,
    #[serde(default)]
    pub white: u32,
}

/// Authoritative remaining time for one player, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub main_time: u32,
    pub byo_yomi: u32,
    pub periods: u32,
}

impl TimerSnapshot {
    pub const fn new(main_time: u32, byo_yomi: u32, periods: u32) -> Self {
        Self {
            main_time,
            byo_yomi,
            periods,
        }
    }

    /// All main time, byo-yomi and periods used up.
    pub fn is_exhausted(&self) -> bool {
        self.main_time == 0 && self.byo_yomi == 0 && self.periods == 0
    }
}

impl Default for TimerSnapshot {
    /// Five minutes main time and three 30-second periods.
    fn default() -> Self {
        Self::new(300, 30, 3)
    }
}

/// Full match snapshot carried by `game_update`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GameSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<Board>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_player: Option<Stone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<Captured>,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_timer: Option<TimerSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_timer: Option<TimerSnapshot>,
    /// Number of moves the server has recorded; orders snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,
    /// Byo-yomi seconds per period, when the server states it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byo_yomi_period: Option<u32>,
}

// ── Room payloads ───────────────────────────────────────────────────

/// A seated player as listed in a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomPlayer {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elo: Option<i32>,
}

impl RoomPlayer {
    pub fn new(username: impl Into<String>, elo: Option<i32>) -> Self {
        Self {
            username: username.into(),
            elo,
        }
    }
}

/// Body of a room as the server describes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RoomData {
    #[serde(default)]
    pub players: Vec<RoomPlayer>,
    /// `None` when the update does not restate readiness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<BTreeMap<String, bool>>,
    #[serde(default)]
    pub started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
}

/// Payload of `room_update`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomUpdatePayload {
    pub room_id: String,
    #[serde(default)]
    pub data: RoomData,
}

/// One entry of the `lobby_update` room list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSummary {
    pub room_id: String,
    #[serde(flatten)]
    pub data: RoomData,
}

// ── Messages ────────────────────────────────────────────────────────

/// Events sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full snapshot of one room.
    #[serde(rename = "room_update")]
    RoomUpdate(RoomUpdatePayload),
    /// Full lobby room list.
    #[serde(rename = "lobby_update")]
    LobbyUpdate {
        #[serde(default)]
        rooms: Vec<RoomSummary>,
    },
    /// Full match snapshot (boxed to reduce enum size).
    #[serde(rename = "game_update")]
    GameUpdate(Box<GameSnapshot>),
    /// One player's ready flag changed.
    #[serde(rename = "readyStateUpdate")]
    ReadyStateUpdate {
        room_id: String,
        username: String,
        ready: bool,
    },
    /// A room was removed by the server.
    #[serde(rename = "room_deleted")]
    RoomDeleted { room_id: String },
    /// The server rejected a game action.
    #[serde(rename = "game_error")]
    GameError { message: String },
}

impl ServerEvent {
    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Serialization`](crate::error::SyncError::Serialization)
    /// for anything that is not a recognized envelope.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn name(&self) -> EventName {
        match self {
            ServerEvent::RoomUpdate(_) => EventName::RoomUpdate,
            ServerEvent::LobbyUpdate { .. } => EventName::LobbyUpdate,
            ServerEvent::GameUpdate(_) => EventName::GameUpdate,
            ServerEvent::ReadyStateUpdate { .. } => EventName::ReadyStateUpdate,
            ServerEvent::RoomDeleted { .. } => EventName::RoomDeleted,
            ServerEvent::GameError { .. } => EventName::GameError,
        }
    }
}

/// Intents sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinLobby {
        username: String,
    },
    GetRooms,
    JoinCustomRoom {
        room_id: String,
        username: String,
    },
    PullRoomInfo {
        room_id: String,
    },
    LeaveRoom {
        room_id: String,
    },
    SetReady {
        room_id: String,
        username: String,
        ready: bool,
    },
    #[serde(rename = "joinGame")]
    JoinGame {
        match_id: String,
        username: String,
    },
    MoveStone {
        match_id: String,
        x: usize,
        y: usize,
    },
    Pass {
        match_id: String,
    },
    Resign {
        match_id: String,
        player: String,
    },
    ConfirmScoring {
        match_id: String,
    },
    MarkDeadStone {
        match_id: String,
        x: usize,
        y: usize,
    },
}

impl ClientMessage {
    /// Encode as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Serialization`](crate::error::SyncError::Serialization)
    /// if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire event name, e.g. `"move_stone"`.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::JoinLobby { .. } => "join_lobby",
            ClientMessage::GetRooms => "get_rooms",
            ClientMessage::JoinCustomRoom { .. } => "join_custom_room",
            ClientMessage::PullRoomInfo { .. } => "pull_room_info",
            ClientMessage::LeaveRoom { .. } => "leave_room",
            ClientMessage::SetReady { .. } => "set_ready",
            ClientMessage::JoinGame { .. } => "joinGame",
            ClientMessage::MoveStone { .. } => "move_stone",
            ClientMessage::Pass { .. } => "pass",
            ClientMessage::Resign { .. } => "resign",
            ClientMessage::ConfirmScoring { .. } => "confirm_scoring",
            ClientMessage::MarkDeadStone { .. } => "mark_dead_stone",
        }
    }
}

/// Encode an arbitrary named event with a JSON payload.
///
/// # Errors
///
/// Returns [`SyncError::Serialization`](crate::error::SyncError::Serialization)
/// if encoding fails.
pub fn encode_event(event: &str, data: &serde_json::Value) -> Result<String> {
    Ok(serde_json::to_string(&serde_json::json!({
        "event": event,
        "data": data,
    }))?)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn board_cells_decode_from_null_and_color_names() {
        let board: Board = serde_json::from_str(r#"[[null,"black"],["white",null]]"#).unwrap();
        assert_eq!(board.size(), 2);
        assert!(board.is_square());
        assert_eq!(board.get(0, 1), Some(Cell::Black));
        assert_eq!(board.get(1, 0), Some(Cell::White));
        assert_eq!(board.get(2, 0), None);
        assert_eq!(
            serde_json::to_string(&board).unwrap(),
            r#"[[null,"black"],["white",null]]"#
        );
    }

    #[test]
    fn ragged_board_is_not_square() {
        let board: Board = serde_json::from_str(r#"[[null,null],[null]]"#).unwrap();
        assert!(!board.is_square());
        assert!(!Board::default().is_square());
    }

    #[test]
    fn placed_in_reports_new_stones_only() {
        let before = Board::empty(3).with_stone(0, 0, Stone::Black);
        let after = before.clone().with_stone(1, 2, Stone::White);
        assert_eq!(before.placed_in(&after), vec![(1, 2, Stone::White)]);
        assert!(after.placed_in(&before).is_empty());
    }

    #[test]
    fn game_update_without_board_still_decodes() {
        let json = r#"{"event":"game_update","data":{"match_id":"m1","current_player":"white"}}"#;
        let ServerEvent::GameUpdate(snapshot) = ServerEvent::from_json(json).unwrap() else {
            panic!("expected game_update");
        };
        assert!(snapshot.board.is_none());
        assert_eq!(snapshot.current_player, Some(Stone::White));
    }

    #[test]
    fn room_update_fixture() {
        let json = r#"{
            "event": "room_update",
            "data": {
                "room_id": "r1",
                "data": {
                    "players": [{"username": "alice", "elo": 1500}, {"username": "bob"}],
                    "ready": {"alice": true},
                    "started": false
                }
            }
        }"#;
        let event = ServerEvent::from_json(json).unwrap();
        assert_eq!(event.name(), EventName::RoomUpdate);
        let ServerEvent::RoomUpdate(payload) = event else {
            panic!("expected room_update");
        };
        assert_eq!(payload.room_id, "r1");
        assert_eq!(payload.data.players[1], RoomPlayer::new("bob", None));
        assert_eq!(payload.data.ready.unwrap().get("alice"), Some(&true));
    }

    #[test]
    fn lobby_room_summaries_are_flat() {
        let json = r#"{"event":"lobby_update","data":{"rooms":[{"room_id":"r9","players":[],"started":false}]}}"#;
        let ServerEvent::LobbyUpdate { rooms } = ServerEvent::from_json(json).unwrap() else {
            panic!("expected lobby_update");
        };
        assert_eq!(rooms[0].room_id, "r9");
        assert!(rooms[0].data.ready.is_none());
    }

    #[test]
    fn ready_state_update_uses_camel_case_event_name() {
        let json = r#"{"event":"readyStateUpdate","data":{"room_id":"r1","username":"alice","ready":true}}"#;
        assert_eq!(
            ServerEvent::from_json(json).unwrap().name(),
            EventName::ReadyStateUpdate
        );
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert!(ServerEvent::from_json(r#"{"event":"nope","data":{}}"#).is_err());
        assert!(ServerEvent::from_json("not json").is_err());
    }

    #[test]
    fn client_messages_use_wire_event_names() {
        let msgs = [
            ClientMessage::JoinLobby {
                username: "a".into(),
            },
            ClientMessage::GetRooms,
            ClientMessage::JoinGame {
                match_id: "m".into(),
                username: "a".into(),
            },
            ClientMessage::MoveStone {
                match_id: "m".into(),
                x: 3,
                y: 4,
            },
            ClientMessage::MarkDeadStone {
                match_id: "m".into(),
                x: 0,
                y: 0,
            },
        ];
        for msg in msgs {
            let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
            assert_eq!(value["event"], msg.event_name());
        }
    }

    #[test]
    fn move_stone_payload_shape() {
        let json = ClientMessage::MoveStone {
            match_id: "m1".into(),
            x: 3,
            y: 15,
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"event": "move_stone", "data": {"match_id": "m1", "x": 3, "y": 15}})
        );
    }

    #[test]
    fn encode_event_wraps_payload() {
        let json = encode_event("custom", &serde_json::json!({"k": 1})).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "custom");
        assert_eq!(value["data"]["k"], 1);
    }
}
