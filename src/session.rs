//! Session: the state store behind the UI.
//!
//! A [`Session`] subscribes to the registry's [`EventBus`] and folds every
//! inbound server event into a [`RoomsState`] and a [`GameState`]. It also
//! turns user intents into outbound messages, validating game intents
//! locally first so that rejected moves never reach the server.
//!
//! All state lives behind one mutex per tree; network handlers, clock ticks
//! and intents each complete under that lock, so a server snapshot applied
//! after a tick simply overwrites the ticked timer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::bus::Subscription;
use crate::channel::ChannelId;
use crate::clock::{ClockConfig, ClockDriver};
use crate::error::{Result, SyncError};
use crate::event::{EventName, SyncEvent};
use crate::game::{self, GameAction, GameState, MoveRejection};
use crate::protocol::{ClientMessage, GameSnapshot, RoomUpdatePayload, ServerEvent, Stone};
use crate::registry::{ChannelRegistry, Connection};
use crate::room::{self, RoomAction, RoomState, RoomsState};

/// Session settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub clock: ClockConfig,
}

impl SessionConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the match clock settings.
    ///
    /// Defaults to [`ClockConfig::default`]: a **1 second** tick and
    /// **30 second** byo-yomi periods.
    #[must_use]
    pub fn with_clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock;
        self
    }
}

type Shared<T> = Arc<Mutex<T>>;

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn dispatch_room(rooms: &Mutex<RoomsState>, action: RoomAction) {
    let mut state = lock(rooms);
    *state = room::reduce(&state, action);
}

fn dispatch_game(game: &Mutex<GameState>, action: GameAction) {
    let mut state = lock(game);
    *state = game::reduce(&state, action);
}

/// Room and game state kept in sync with the server.
pub struct Session {
    registry: ChannelRegistry,
    config: SessionConfig,
    rooms: Shared<RoomsState>,
    game: Shared<GameState>,
    clock: Mutex<Option<ClockDriver>>,
    subscriptions: Vec<Subscription>,
}

impl Session {
    pub fn new(registry: ChannelRegistry, config: SessionConfig) -> Self {
        let rooms: Shared<RoomsState> = Arc::default();
        let game: Shared<GameState> = Arc::default();
        let bus = registry.bus().clone();

        let mut subscriptions = Vec::new();

        let r = Arc::clone(&rooms);
        subscriptions.push(bus.on(EventName::LobbyUpdate, move |event| {
            if let SyncEvent::Server {
                event: ServerEvent::LobbyUpdate { rooms },
                ..
            } = event
            {
                dispatch_room(&r, RoomAction::LobbyUpdate(rooms.clone()));
            }
        }));

        let r = Arc::clone(&rooms);
        let reg = registry.clone();
        subscriptions.push(bus.on(EventName::RoomUpdate, move |event| {
            if let SyncEvent::Server {
                event: ServerEvent::RoomUpdate(update),
                ..
            } = event
            {
                let username = reg.credentials().map(|c| c.username);
                on_room_update(&r, update.clone(), username.as_deref());
            }
        }));

        let r = Arc::clone(&rooms);
        subscriptions.push(bus.on(EventName::ReadyStateUpdate, move |event| {
            if let SyncEvent::Server {
                event:
                    ServerEvent::ReadyStateUpdate {
                        room_id,
                        username,
                        ready,
                    },
                ..
            } = event
            {
                dispatch_room(
                    &r,
                    RoomAction::UpdateReadyState {
                        room_id: room_id.clone(),
                        username: username.clone(),
                        ready: *ready,
                    },
                );
            }
        }));

        let r = Arc::clone(&rooms);
        subscriptions.push(bus.on(EventName::RoomDeleted, move |event| {
            if let SyncEvent::Server {
                event: ServerEvent::RoomDeleted { room_id },
                ..
            } = event
            {
                on_room_deleted(&r, room_id);
            }
        }));

        let g = Arc::clone(&game);
        subscriptions.push(bus.on(EventName::GameUpdate, move |event| {
            if let SyncEvent::Server {
                event: ServerEvent::GameUpdate(snapshot),
                ..
            } = event
            {
                on_game_update(&g, snapshot);
            }
        }));

        let g = Arc::clone(&game);
        subscriptions.push(bus.on(EventName::GameError, move |event| {
            if let SyncEvent::Server {
                event: ServerEvent::GameError { message },
                ..
            } = event
            {
                warn!("server rejected game action: {message}");
                dispatch_game(&g, GameAction::SetError(Some(message.clone())));
            }
        }));

        Self {
            registry,
            config,
            rooms,
            game,
            clock: Mutex::new(None),
            subscriptions,
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Snapshot of the room view.
    pub fn rooms(&self) -> RoomsState {
        lock(&self.rooms).clone()
    }

    /// Snapshot of the game view.
    pub fn game(&self) -> GameState {
        lock(&self.game).clone()
    }

    // ── Lobby & rooms ───────────────────────────────────────────────

    /// Connect to the lobby; the registry sends `join_lobby` and `get_rooms`.
    pub async fn join_lobby(&self) -> Result<Connection> {
        self.registry.connect(&ChannelId::Lobby).await
    }

    pub fn leave_lobby(&self) {
        self.registry.disconnect(&ChannelId::Lobby);
    }

    /// Ask the server for a fresh room list.
    pub fn refresh_rooms(&self) {
        self.registry.send(&ChannelId::Lobby, &ClientMessage::GetRooms);
    }

    /// Remember that the local user created `room_id`.
    pub fn set_created_room(&self, room_id: impl Into<String>) {
        dispatch_room(&self.rooms, RoomAction::SetCreatedRoomId(Some(room_id.into())));
    }

    /// Connect to a room; the registry sends `join_custom_room` and `pull_room_info`.
    pub async fn join_room(&self, room_id: &str) -> Result<Connection> {
        let conn = self.registry.connect(&ChannelId::room(room_id)).await?;
        let created = lock(&self.rooms).created_room_id.as_deref() == Some(room_id);
        dispatch_room(&self.rooms, RoomAction::SetIsJoiner(!created));
        info!(room_id, created, "joined room");
        Ok(conn)
    }

    /// Tell the server we are leaving, then release the room channel.
    pub fn leave_room(&self, room_id: &str) {
        let channel = ChannelId::room(room_id);
        self.registry.send(
            &channel,
            &ClientMessage::LeaveRoom {
                room_id: room_id.to_string(),
            },
        );
        self.registry.disconnect(&channel);

        let mut state = lock(&self.rooms);
        if state.current_room_id() == Some(room_id) {
            *state = room::reduce(&state, RoomAction::SetCurrentRoom(None));
        }
        if state.created_room_id.as_deref() == Some(room_id) {
            *state = room::reduce(&state, RoomAction::SetCreatedRoomId(None));
            *state = room::reduce(&state, RoomAction::SetIsCreator(false));
        }
        *state = room::reduce(&state, RoomAction::SetIsJoiner(false));
    }

    /// # Errors
    ///
    /// [`SyncError::MissingCredentials`] when no username is available.
    pub fn set_ready(&self, room_id: &str, ready: bool) -> Result<()> {
        let username = self.username()?;
        self.registry.send(
            &ChannelId::room(room_id),
            &ClientMessage::SetReady {
                room_id: room_id.to_string(),
                username,
                ready,
            },
        );
        Ok(())
    }

    // ── Match ───────────────────────────────────────────────────────

    /// Connect to a match and start its clock.
    ///
    /// Player names are taken from the current room when it started this match.
    /// A different match still held by this session is released first.
    pub async fn join_match(&self, match_id: &str) -> Result<Connection> {
        let previous = {
            let players: Option<Vec<String>> = lock(&self.rooms)
                .current_room
                .as_ref()
                .filter(|r| r.match_id.as_deref() == Some(match_id))
                .map(|r| r.players.iter().map(|p| p.username.clone()).collect());

            let mut game = lock(&self.game);
            let previous = game.match_id.clone().filter(|id| id != match_id);
            if game.match_id.as_deref() != Some(match_id) {
                *game = game::reduce(&game, GameAction::ResetGame);
                *game = game::reduce(&game, GameAction::SetMatchId(Some(match_id.to_string())));
            }
            if let Some(players) = players {
                *game = game::reduce(&game, GameAction::SetPlayers(players));
            }
            previous
        };
        if let Some(previous) = previous {
            info!(from = %previous, to = match_id, "switching match");
            self.stop_clock();
            self.registry.disconnect(&ChannelId::match_(previous));
        }

        let conn = self.registry.connect(&ChannelId::match_(match_id)).await?;
        self.start_clock();
        info!(match_id, "joined match");
        Ok(conn)
    }

    /// Stop the clock, release the match channel and discard the game.
    pub fn leave_match(&self) {
        self.stop_clock();
        let match_id = lock(&self.game).match_id.clone();
        if let Some(match_id) = match_id {
            self.registry.disconnect(&ChannelId::match_(match_id));
        }
        dispatch_game(&self.game, GameAction::ResetGame);
    }

    /// Place a stone, after checking the move locally.
    ///
    /// # Errors
    ///
    /// [`SyncError::MoveRejected`] when the move is not allowed; the reason
    /// is also stored in [`GameState::error_message`].
    pub fn play_move(&self, x: usize, y: usize) -> Result<()> {
        let match_id = self.checked(|game| game.check_move(x, y))?;
        self.send_match(&match_id, &ClientMessage::MoveStone { match_id: match_id.clone(), x, y });
        Ok(())
    }

    /// # Errors
    ///
    /// [`SyncError::MoveRejected`] while replaying or after game over.
    pub fn pass(&self) -> Result<()> {
        let match_id = self.checked(GameState::check_turn_action)?;
        self.send_match(&match_id, &ClientMessage::Pass { match_id: match_id.clone() });
        Ok(())
    }

    /// # Errors
    ///
    /// [`SyncError::MoveRejected`] while replaying or after game over,
    /// [`SyncError::MissingCredentials`] without a username.
    pub fn resign(&self) -> Result<()> {
        let player = self.username()?;
        let match_id = self.checked(GameState::check_turn_action)?;
        dispatch_game(&self.game, GameAction::SetConfirmResignOpen(false));
        self.send_match(&match_id, &ClientMessage::Resign { match_id: match_id.clone(), player });
        Ok(())
    }

    /// # Errors
    ///
    /// [`SyncError::MoveRejected`] when no match is loaded.
    pub fn confirm_scoring(&self) -> Result<()> {
        let match_id = self.checked(|game| {
            if game.is_loaded() {
                Ok(())
            } else {
                Err(MoveRejection::NotLoaded)
            }
        })?;
        self.send_match(&match_id, &ClientMessage::ConfirmScoring { match_id: match_id.clone() });
        Ok(())
    }

    /// Toggle a dead-stone mark locally and tell the server.
    ///
    /// # Errors
    ///
    /// [`SyncError::MoveRejected`] outside scoring mode or off the board.
    pub fn mark_dead_stone(&self, x: usize, y: usize) -> Result<()> {
        let match_id = self.checked(|game| game.check_mark_dead(x, y))?;
        dispatch_game(&self.game, GameAction::ToggleDeadStone { x, y });
        self.send_match(&match_id, &ClientMessage::MarkDeadStone { match_id: match_id.clone(), x, y });
        Ok(())
    }

    pub fn prev_step(&self) {
        dispatch_game(&self.game, GameAction::PrevStep);
    }

    pub fn next_step(&self) {
        dispatch_game(&self.game, GameAction::NextStep);
    }

    /// Apply a UI-only action such as opening a confirmation dialog.
    pub fn dispatch_game(&self, action: GameAction) {
        dispatch_game(&self.game, action);
    }

    /// SGF record of the loaded match.
    pub fn export_sgf(&self) -> Option<String> {
        let game = lock(&self.game);
        if !game.is_loaded() {
            return None;
        }
        let black = game.player(Stone::Black).unwrap_or("Black");
        let white = game.player(Stone::White).unwrap_or("White");
        Some(game.history.to_sgf(black, white))
    }

    pub fn clock_running(&self) -> bool {
        lock(&self.clock).as_ref().is_some_and(ClockDriver::is_running)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn username(&self) -> Result<String> {
        self.registry
            .credentials()
            .map(|c| c.username)
            .ok_or(SyncError::MissingCredentials)
    }

    /// Run a local check against the game. Rejections are recorded in
    /// `error_message`; on success the error is cleared and the match id returned.
    fn checked<F>(&self, check: F) -> Result<String>
    where
        F: FnOnce(&GameState) -> std::result::Result<(), MoveRejection>,
    {
        let mut game = lock(&self.game);
        let outcome = check(&*game).and_then(|()| game.match_id.clone().ok_or(MoveRejection::NotLoaded));
        match outcome {
            Ok(match_id) => {
                *game = game::reduce(&game, GameAction::SetError(None));
                Ok(match_id)
            }
            Err(rejection) => {
                debug!(%rejection, "intent rejected locally");
                *game = game::reduce(&game, GameAction::SetError(Some(rejection.to_string())));
                Err(rejection.into())
            }
        }
    }

    fn send_match(&self, match_id: &str, message: &ClientMessage) {
        self.registry.send(&ChannelId::match_(match_id), message);
    }

    fn start_clock(&self) {
        let game = Arc::clone(&self.game);
        let driver = ClockDriver::start(self.config.clock.tick, move || {
            dispatch_game(&game, GameAction::Tick);
        });
        // Replacing an old driver drops and stops it.
        *lock(&self.clock) = Some(driver);
    }

    fn stop_clock(&self) {
        if let Some(mut driver) = lock(&self.clock).take() {
            driver.stop();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_clock();
        for sub in self.subscriptions.drain(..) {
            sub.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("clock_running", &self.clock_running())
            .finish()
    }
}

// ── Event folding ───────────────────────────────────────────────────

fn on_room_update(
    rooms: &Mutex<RoomsState>,
    update: RoomUpdatePayload,
    username: Option<&str>,
) {
    let room_id = update.room_id.clone();
    let mut state = lock(rooms);
    *state = room::reduce(&state, RoomAction::RoomUpdate(update.clone()));

    let created = state.created_room_id.as_deref() == Some(room_id.as_str());
    if created {
        *state = room::reduce(&state, RoomAction::SetIsCreator(true));
    }
    let seated = username.is_some_and(|name| update.data.players.iter().any(|p| p.username == name));
    if (created || seated) && state.current_room_id() != Some(room_id.as_str()) {
        let room = state
            .room(&room_id)
            .cloned()
            .unwrap_or_else(|| RoomState::from_payload(room_id.clone(), update.data));
        *state = room::reduce(&state, RoomAction::SetCurrentRoom(Some(room)));
    }
}

fn on_room_deleted(rooms: &Mutex<RoomsState>, room_id: &str) {
    let mut state = lock(rooms);
    *state = room::reduce(&state, RoomAction::RoomDeleted(room_id.to_string()));
    if state.created_room_id.as_deref() == Some(room_id) {
        *state = room::reduce(&state, RoomAction::SetCreatedRoomId(None));
        *state = room::reduce(&state, RoomAction::SetIsCreator(false));
    }
}

fn on_game_update(game: &Mutex<GameState>, snapshot: &GameSnapshot) {
    let mut state = lock(game);
    if let (Some(ours), Some(theirs)) = (&state.match_id, &snapshot.match_id) {
        if ours != theirs {
            debug!(ours = %ours, theirs = %theirs, "game update for a match we left");
            return;
        }
    }
    let action = if state.is_loaded() {
        GameAction::UpdateGame(Box::new(snapshot.clone()))
    } else {
        GameAction::LoadMatch(Box::new(snapshot.clone()))
    };
    *state = game::reduce(&state, action);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::protocol::{Board, RoomData, RoomPlayer, RoomSummary};

    fn payload(room_id: &str, names: &[&str]) -> RoomUpdatePayload {
        RoomUpdatePayload {
            room_id: room_id.to_string(),
            data: RoomData {
                players: names.iter().map(|n| RoomPlayer::new(*n, None)).collect(),
                ..RoomData::default()
            },
        }
    }

    #[test]
    fn room_update_seats_us_in_the_room() {
        let rooms = Mutex::new(RoomsState::default());
        on_room_update(&rooms, payload("r1", &["bob"]), Some("alice"));
        assert!(lock(&rooms).current_room.is_none());

        on_room_update(&rooms, payload("r1", &["bob", "alice"]), Some("alice"));
        assert_eq!(lock(&rooms).current_room_id(), Some("r1"));
    }

    #[test]
    fn room_update_marks_the_creator() {
        let rooms = Mutex::new(reduce_rooms(RoomAction::SetCreatedRoomId(Some("r1".into()))));
        on_room_update(&rooms, payload("r1", &[]), None);
        let state = lock(&rooms);
        assert!(state.is_creator);
        assert_eq!(state.current_room_id(), Some("r1"));
    }

    #[test]
    fn lobby_update_refreshes_the_current_room() {
        let rooms = Mutex::new(RoomsState::default());
        on_room_update(&rooms, payload("r1", &["alice"]), Some("alice"));

        let listed = payload("r1", &["alice", "bob"]);
        dispatch_room(
            &rooms,
            RoomAction::LobbyUpdate(vec![RoomSummary {
                room_id: listed.room_id,
                data: listed.data,
            }]),
        );
        let state = lock(&rooms);
        assert_eq!(state.current_room.as_ref().map(|r| r.players.len()), Some(2));
        assert_eq!(state.current_room.as_ref(), state.room("r1"));
    }

    #[test]
    fn deleting_our_room_forgets_it() {
        let rooms = Mutex::new(reduce_rooms(RoomAction::SetCreatedRoomId(Some("r1".into()))));
        on_room_update(&rooms, payload("r1", &["alice"]), Some("alice"));
        on_room_deleted(&rooms, "r1");
        let state = lock(&rooms);
        assert!(state.current_room.is_none());
        assert!(state.created_room_id.is_none());
        assert!(!state.is_creator);
    }

    #[test]
    fn first_game_update_loads_then_appends() {
        let game = Mutex::new(GameState::default());
        let snap = |board: Board, n| GameSnapshot {
            match_id: Some("m1".into()),
            board: Some(board),
            history_length: Some(n),
            ..GameSnapshot::default()
        };
        on_game_update(&game, &snap(Board::empty(9), 0));
        assert_eq!(lock(&game).history.len(), 1);

        on_game_update(&game, &snap(Board::empty(9).with_stone(0, 0, Stone::Black), 1));
        assert_eq!(lock(&game).history.len(), 2);

        let mut other = snap(Board::empty(9), 5);
        other.match_id = Some("m2".into());
        on_game_update(&game, &other);
        assert_eq!(lock(&game).history.len(), 2);
    }

    fn reduce_rooms(action: RoomAction) -> RoomsState {
        room::reduce(&RoomsState::default(), action)
    }
}
