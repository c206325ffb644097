//! Room reducer: lobby room list plus the room the local user sits in.
//!
//! Rooms are only ever changed by server events. The reducer never invents
//! players and never infers readiness; it only keeps what the server said
//! consistent with the current player list.

use std::collections::BTreeMap;

use tracing::debug;

use crate::protocol::{RoomData, RoomPlayer, RoomSummary, RoomUpdatePayload};

/// One pre-game room.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomState {
    pub room_id: String,
    /// Join order; the first player created the room.
    pub players: Vec<RoomPlayer>,
    pub ready: BTreeMap<String, bool>,
    pub started: bool,
    pub match_id: Option<String>,
}

impl RoomState {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            ..Self::default()
        }
    }

    /// Build from a wire payload, dropping anything inconsistent.
    pub fn from_payload(room_id: impl Into<String>, data: RoomData) -> Self {
        let mut room = Self {
            room_id: room_id.into(),
            players: data.players,
            ready: data.ready.unwrap_or_default(),
            started: data.started,
            match_id: data.match_id,
        };
        room.normalize();
        room
    }

    pub fn creator(&self) -> Option<&RoomPlayer> {
        self.players.first()
    }

    pub fn has_player(&self, username: &str) -> bool {
        self.players.iter().any(|p| p.username == username)
    }

    pub fn is_ready(&self, username: &str) -> bool {
        self.ready.get(username).copied().unwrap_or(false)
    }

    /// Two seated players, both ready.
    pub fn all_ready(&self) -> bool {
        self.players.len() == 2 && self.players.iter().all(|p| self.is_ready(&p.username))
    }

    /// Ready flags only for seated players; a match id only once started
    /// with exactly two players.
    fn normalize(&mut self) {
        let players = &self.players;
        self.ready
            .retain(|username, _| players.iter().any(|p| &p.username == username));
        if !(self.started && self.players.len() == 2) {
            self.match_id = None;
        }
    }

    /// Apply a `room_update`. Flags the update does not restate are kept
    /// for players who are still seated.
    fn merged(&self, data: &RoomData) -> RoomState {
        let mut ready = self.ready.clone();
        if let Some(incoming) = &data.ready {
            ready.extend(incoming.iter().map(|(k, v)| (k.clone(), *v)));
        }
        let mut room = RoomState {
            room_id: self.room_id.clone(),
            players: data.players.clone(),
            ready,
            started: data.started,
            match_id: data.match_id.clone(),
        };
        room.normalize();
        room
    }

    fn with_ready(&self, username: &str, ready: bool) -> RoomState {
        let mut room = self.clone();
        room.ready.insert(username.to_string(), ready);
        room.normalize();
        room
    }
}

impl From<RoomSummary> for RoomState {
    fn from(summary: RoomSummary) -> Self {
        RoomState::from_payload(summary.room_id, summary.data)
    }
}

/// Lobby-wide room view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomsState {
    pub rooms: Vec<RoomState>,
    pub current_room: Option<RoomState>,
    pub created_room_id: Option<String>,
    pub is_creator: bool,
    pub is_joiner: bool,
}

impl RoomsState {
    pub fn room(&self, room_id: &str) -> Option<&RoomState> {
        self.rooms.iter().find(|r| r.room_id == room_id)
    }

    pub fn current_room_id(&self) -> Option<&str> {
        self.current_room.as_ref().map(|r| r.room_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    SetRooms(Vec<RoomState>),
    /// Fresh lobby listing. Rooms already known keep the ready flags of
    /// seated players unless the listing restates them.
    LobbyUpdate(Vec<RoomSummary>),
    AddRoom(RoomState),
    RemoveRoom(String),
    SetCurrentRoom(Option<RoomState>),
    RoomUpdate(RoomUpdatePayload),
    UpdateReadyState {
        room_id: String,
        username: String,
        ready: bool,
    },
    RoomDeleted(String),
    SetCreatedRoomId(Option<String>),
    SetIsCreator(bool),
    SetIsJoiner(bool),
}

pub fn reduce(state: &RoomsState, action: RoomAction) -> RoomsState {
    let mut next = state.clone();
    match action {
        RoomAction::SetRooms(rooms) => next.rooms = rooms,
        RoomAction::LobbyUpdate(summaries) => {
            next.rooms = summaries
                .into_iter()
                .map(|summary| {
                    let known = state
                        .current_room
                        .as_ref()
                        .filter(|r| r.room_id == summary.room_id)
                        .or_else(|| state.room(&summary.room_id));
                    match known {
                        Some(room) => room.merged(&summary.data),
                        None => RoomState::from(summary),
                    }
                })
                .collect();
            if let Some(current) = next.current_room.as_mut() {
                if let Some(listed) = next.rooms.iter().find(|r| r.room_id == current.room_id) {
                    *current = listed.clone();
                }
            }
        }
        RoomAction::AddRoom(room) => {
            if state.room(&room.room_id).is_some() {
                debug!(room_id = %room.room_id, "room already listed");
            } else {
                next.rooms.push(room);
            }
        }
        RoomAction::RemoveRoom(room_id) => next.rooms.retain(|r| r.room_id != room_id),
        RoomAction::SetCurrentRoom(room) => next.current_room = room,
        RoomAction::RoomUpdate(update) => {
            let base = state
                .current_room
                .as_ref()
                .filter(|r| r.room_id == update.room_id)
                .or_else(|| state.room(&update.room_id))
                .cloned()
                .unwrap_or_else(|| RoomState::new(update.room_id.clone()));
            let updated = base.merged(&update.data);

            for room in next.rooms.iter_mut().filter(|r| r.room_id == update.room_id) {
                *room = updated.clone();
            }
            if let Some(current) = next
                .current_room
                .as_mut()
                .filter(|r| r.room_id == update.room_id)
            {
                *current = updated;
            }
        }
        RoomAction::UpdateReadyState {
            room_id,
            username,
            ready,
        } => {
            for room in next.rooms.iter_mut().filter(|r| r.room_id == room_id) {
                *room = room.with_ready(&username, ready);
            }
            if let Some(current) = next.current_room.as_mut().filter(|r| r.room_id == room_id) {
                *current = current.with_ready(&username, ready);
            }
        }
        RoomAction::RoomDeleted(room_id) => {
            next.rooms.retain(|r| r.room_id != room_id);
            if state.current_room_id() == Some(room_id.as_str()) {
                next.current_room = None;
            }
        }
        RoomAction::SetCreatedRoomId(room_id) => next.created_room_id = room_id,
        RoomAction::SetIsCreator(on) => next.is_creator = on,
        RoomAction::SetIsJoiner(on) => next.is_joiner = on,
    }
    next
}
