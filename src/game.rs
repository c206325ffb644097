//! Game reducer: folds authoritative snapshots, replay navigation, clock
//! ticks and UI flags into a [`GameState`].
//!
//! [`reduce`] is pure and total. Malformed input (a snapshot without a
//! board, a snapshot for another match, an out-of-order snapshot) leaves the
//! state unchanged and is logged.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, warn};

use crate::clock::{advance, DEFAULT_PERIOD_LENGTH};
use crate::history::{HistoryEntry, HistoryLog};
use crate::protocol::{Board, Captured, GameSnapshot, Stone, TimerSnapshot};

/// Local view of one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub match_id: Option<String>,
    pub board: Board,
    pub current_player: Stone,
    pub captured: Captured,
    pub passes: u32,
    pub game_over: bool,
    pub winner: Option<String>,
    pub black_timer: TimerSnapshot,
    pub white_timer: TimerSnapshot,
    pub history: HistoryLog,
    /// Index into `history` of the position on display.
    pub current_step: usize,
    /// `[black, white]` usernames once known.
    pub players: Vec<String>,
    pub error_message: Option<String>,
    pub resign_message: Option<String>,
    pub confirm_new_game_open: bool,
    pub confirm_resign_open: bool,
    pub scoring_mode: bool,
    pub dead_stones: BTreeSet<(usize, usize)>,
    /// Byo-yomi seconds restored per consumed period.
    pub period_length: u32,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            match_id: None,
            board: Board::default(),
            current_player: Stone::Black,
            captured: Captured::default(),
            passes: 0,
            game_over: false,
            winner: None,
            black_timer: TimerSnapshot::default(),
            white_timer: TimerSnapshot::default(),
            history: HistoryLog::new(),
            current_step: 0,
            players: Vec::new(),
            error_message: None,
            resign_message: None,
            confirm_new_game_open: false,
            confirm_resign_open: false,
            scoring_mode: false,
            dead_stones: BTreeSet::new(),
            period_length: DEFAULT_PERIOD_LENGTH,
        }
    }
}

/// Why a local intent was refused before reaching the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    NotLoaded,
    Replaying,
    GameOver,
    ScoringMode,
    NotScoring,
    OutOfBounds { x: usize, y: usize },
    Occupied { x: usize, y: usize },
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveRejection::NotLoaded => f.write_str("no match loaded"),
            MoveRejection::Replaying => {
                f.write_str("reviewing an earlier position; return to the latest move first")
            }
            MoveRejection::GameOver => f.write_str("the game is over"),
            MoveRejection::ScoringMode => f.write_str("moves are disabled while scoring"),
            MoveRejection::NotScoring => f.write_str("dead stones can only be marked while scoring"),
            MoveRejection::OutOfBounds { x, y } => write!(f, "({x}, {y}) is off the board"),
            MoveRejection::Occupied { x, y } => write!(f, "({x}, {y}) is already occupied"),
        }
    }
}

impl std::error::Error for MoveRejection {}

impl GameState {
    pub fn is_loaded(&self) -> bool {
        !self.history.is_empty()
    }

    /// `true` while an earlier position is on display.
    pub fn is_replaying(&self) -> bool {
        self.is_loaded() && self.current_step < self.history.last_index()
    }

    /// Timer of the player to move.
    pub fn active_timer(&self) -> &TimerSnapshot {
        match self.current_player {
            Stone::Black => &self.black_timer,
            Stone::White => &self.white_timer,
        }
    }

    /// Username playing `stone`, when known.
    pub fn player(&self, stone: Stone) -> Option<&str> {
        let index = match stone {
            Stone::Black => 0,
            Stone::White => 1,
        };
        self.players.get(index).map(String::as_str)
    }

    /// Validate a stone placement at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns the first [`MoveRejection`] that applies.
    pub fn check_move(&self, x: usize, y: usize) -> Result<(), MoveRejection> {
        self.check_turn_action()?;
        if self.scoring_mode {
            return Err(MoveRejection::ScoringMode);
        }
        match self.board.get(x, y) {
            None => Err(MoveRejection::OutOfBounds { x, y }),
            Some(cell) if !cell.is_empty() => Err(MoveRejection::Occupied { x, y }),
            Some(_) => Ok(()),
        }
    }

    /// Validate a pass or a resignation.
    ///
    /// # Errors
    ///
    /// Rejected when nothing is loaded, while replaying, or after game over.
    pub fn check_turn_action(&self) -> Result<(), MoveRejection> {
        if !self.is_loaded() {
            return Err(MoveRejection::NotLoaded);
        }
        if self.is_replaying() {
            return Err(MoveRejection::Replaying);
        }
        if self.game_over {
            return Err(MoveRejection::GameOver);
        }
        Ok(())
    }

    /// Validate marking `(x, y)` as dead during scoring.
    ///
    /// # Errors
    ///
    /// Rejected outside scoring mode, while replaying, or off the board.
    pub fn check_mark_dead(&self, x: usize, y: usize) -> Result<(), MoveRejection> {
        if !self.is_loaded() {
            return Err(MoveRejection::NotLoaded);
        }
        if self.is_replaying() {
            return Err(MoveRejection::Replaying);
        }
        if !self.scoring_mode {
            return Err(MoveRejection::NotScoring);
        }
        if self.board.get(x, y).is_none() {
            return Err(MoveRejection::OutOfBounds { x, y });
        }
        Ok(())
    }

    /// Point the view fields at `history[step]`.
    fn show(&mut self, step: usize) {
        if let Some(entry) = self.history.get(step) {
            self.board = entry.board.clone();
            self.current_player = entry.current_player;
            self.passes = entry.passes;
            self.captured = entry.captured;
            self.game_over = entry.game_over;
            self.winner = entry.winner.clone();
            self.current_step = step;
        }
    }

    fn apply_timers(&mut self, snapshot: &GameSnapshot) {
        if let Some(timer) = snapshot.black_timer {
            self.black_timer = timer;
        }
        if let Some(timer) = snapshot.white_timer {
            self.white_timer = timer;
        }
        if let Some(period) = snapshot.byo_yomi_period {
            self.period_length = period;
        }
    }
}

/// Everything that can change a [`GameState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    LoadMatch(Box<GameSnapshot>),
    UpdateGame(Box<GameSnapshot>),
    PrevStep,
    NextStep,
    Tick,
    ResetGame,
    SetMatchId(Option<String>),
    SetPlayers(Vec<String>),
    SetError(Option<String>),
    SetResignMessage(Option<String>),
    SetConfirmNewGameOpen(bool),
    SetConfirmResignOpen(bool),
    SetScoringMode(bool),
    ToggleDeadStone { x: usize, y: usize },
}

pub fn reduce(state: &GameState, action: GameAction) -> GameState {
    let mut next = state.clone();
    match action {
        GameAction::LoadMatch(snapshot) => return load_match(state, &snapshot),
        GameAction::UpdateGame(snapshot) => return update_game(state, &snapshot),
        GameAction::PrevStep => {
            if state.current_step > 0 {
                next.show(state.current_step - 1);
            }
        }
        GameAction::NextStep => {
            if state.current_step < state.history.last_index() {
                next.show(state.current_step + 1);
            }
        }
        GameAction::Tick => tick(&mut next),
        GameAction::ResetGame => return GameState::default(),
        GameAction::SetMatchId(match_id) => next.match_id = match_id,
        GameAction::SetPlayers(players) => next.players = players,
        GameAction::SetError(message) => next.error_message = message,
        GameAction::SetResignMessage(message) => next.resign_message = message,
        GameAction::SetConfirmNewGameOpen(open) => next.confirm_new_game_open = open,
        GameAction::SetConfirmResignOpen(open) => next.confirm_resign_open = open,
        GameAction::SetScoringMode(on) => {
            next.scoring_mode = on;
            if !on {
                next.dead_stones.clear();
            }
        }
        GameAction::ToggleDeadStone { x, y } => {
            if !next.dead_stones.remove(&(x, y)) {
                next.dead_stones.insert((x, y));
            }
        }
    }
    next
}

fn load_match(state: &GameState, snapshot: &GameSnapshot) -> GameState {
    let Some(root) = HistoryEntry::from_snapshot(snapshot) else {
        warn!(match_id = ?snapshot.match_id, "ignoring match load without a board");
        return state.clone();
    };
    if !root.board.is_square() {
        warn!(match_id = ?snapshot.match_id, "ignoring match load with a non-square board");
        return state.clone();
    }

    let mut next = state.clone();
    next.match_id = snapshot.match_id.clone().or_else(|| state.match_id.clone());
    next.history = HistoryLog::with_root(root);
    next.black_timer = snapshot.black_timer.unwrap_or_default();
    next.white_timer = snapshot.white_timer.unwrap_or_default();
    next.period_length = snapshot.byo_yomi_period.unwrap_or(DEFAULT_PERIOD_LENGTH);
    next.scoring_mode = false;
    next.dead_stones.clear();
    next.show(0);
    debug!(match_id = ?next.match_id, "match loaded");
    next
}

fn update_game(state: &GameState, snapshot: &GameSnapshot) -> GameState {
    let Some(tail) = state.history.latest() else {
        return load_match(state, snapshot);
    };

    if let (Some(ours), Some(theirs)) = (&state.match_id, &snapshot.match_id) {
        if ours != theirs {
            warn!(ours = %ours, theirs = %theirs, "ignoring update for another match");
            return state.clone();
        }
    }

    let Some(mut entry) = HistoryEntry::from_snapshot(snapshot) else {
        warn!(match_id = ?state.match_id, "ignoring game update without a board");
        return state.clone();
    };
    if !entry.board.is_square() || entry.board.size() != tail.board.size() {
        warn!(match_id = ?state.match_id, "ignoring game update with a malformed board");
        return state.clone();
    }

    if let (Some(known), Some(incoming)) = (tail.history_length, entry.history_length) {
        if incoming < known {
            debug!(known, incoming, "ignoring out-of-order game update");
            return state.clone();
        }
    }

    // Absent counters carry over from the tail.
    if snapshot.current_player.is_none() {
        entry.current_player = tail.current_player;
    }
    if snapshot.passes.is_none() {
        entry.passes = tail.passes;
    }
    if snapshot.captured.is_none() {
        entry.captured = tail.captured;
    }

    let mut next = state.clone();
    next.apply_timers(snapshot);

    let duplicate = entry.same_position(tail)
        && (entry.history_length == tail.history_length || entry.history_length.is_none());
    if duplicate {
        debug!(match_id = ?state.match_id, "duplicate game update, timers refreshed");
        return next;
    }

    next.history.push(entry);
    next.show(next.history.last_index());
    next
}

fn tick(state: &mut GameState) {
    if !state.is_loaded() || state.is_replaying() || state.game_over || state.scoring_mode {
        return;
    }
    let period_length = state.period_length;
    let player = state.current_player;
    let timer = match player {
        Stone::Black => &mut state.black_timer,
        Stone::White => &mut state.white_timer,
    };
    *timer = advance(timer, period_length);
    if !timer.is_exhausted() {
        return;
    }

    let winner = format!("{} wins by time", player.opponent().title());
    debug!(loser = %player, "flagged on time");
    state.game_over = true;
    state.winner = Some(winner.clone());
    if let Some(tail) = state.history.latest_mut() {
        tail.game_over = true;
        tail.winner = Some(winner);
    }
}
