//! Ordered log of authoritative game snapshots.
//!
//! Entry 0 is the position at load time; every accepted `game_update`
//! appends one entry. The log never truncates, so stepping back through it
//! (replay) and then receiving new snapshots keeps everything.

use std::fmt::Write as _;

use crate::protocol::{Board, Captured, GameSnapshot, Stone};

/// One recorded position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub board: Board,
    pub current_player: Stone,
    pub passes: u32,
    pub captured: Captured,
    pub game_over: bool,
    pub winner: Option<String>,
    /// Server move counter, when the snapshot carried one.
    pub history_length: Option<u32>,
}

impl HistoryEntry {
    /// Build an entry from a snapshot. Returns `None` when it has no board.
    pub fn from_snapshot(snapshot: &GameSnapshot) -> Option<Self> {
        let board = snapshot.board.clone()?;
        Some(Self {
            board,
            current_player: snapshot.current_player.unwrap_or_default(),
            passes: snapshot.passes.unwrap_or(0),
            captured: snapshot.captured.unwrap_or_default(),
            game_over: snapshot.game_over,
            winner: snapshot.winner.clone(),
            history_length: snapshot.history_length,
        })
    }

    /// Same position, ignoring the move counter.
    pub fn same_position(&self, other: &HistoryEntry) -> bool {
        self.board == other.board
            && self.current_player == other.current_player
            && self.passes == other.passes
            && self.captured == other.captured
            && self.game_over == other.game_over
            && self.winner == other.winner
    }
}

/// A move reconstructed from two consecutive entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Play { stone: Stone, x: usize, y: usize },
    Pass { stone: Stone },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log holding only `root`.
    pub fn with_root(root: HistoryEntry) -> Self {
        Self {
            entries: vec![root],
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Mutable access to the tail, for refreshing it in place.
    pub fn latest_mut(&mut self) -> Option<&mut HistoryEntry> {
        self.entries.last_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the newest entry, or 0 when empty.
    pub fn last_index(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Moves between consecutive entries.
    ///
    /// A new stone counts as a play by its color. An unchanged board with a
    /// higher pass counter is a pass by the player who was to move. Anything
    /// else (a resignation, a refreshed duplicate) yields no move.
    pub fn moves(&self) -> Vec<Move> {
        self.entries
            .windows(2)
            .filter_map(|pair| {
                let [prev, next] = pair else {
                    return None;
                };
                let placed = prev.board.placed_in(&next.board);
                if let Some(&(x, y, stone)) = placed
                    .iter()
                    .find(|(_, _, stone)| *stone == prev.current_player)
                    .or_else(|| placed.first())
                {
                    Some(Move::Play { stone, x, y })
                } else if next.passes > prev.passes {
                    Some(Move::Pass {
                        stone: prev.current_player,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Render the main line as an SGF game record.
    pub fn to_sgf(&self, black: &str, white: &str) -> String {
        let size = self.entries.first().map_or(19, |entry| entry.board.size());
        let mut sgf = format!(
            "(;GM[1]FF[4]SZ[{size}]PB[{}]PW[{}]",
            escape(black),
            escape(white)
        );
        if let Some(result) = self
            .latest()
            .and_then(|entry| entry.winner.as_deref())
            .and_then(result_tag)
        {
            let _ = write!(sgf, "RE[{result}]");
        }
        for mv in self.moves() {
            let _ = match mv {
                Move::Play { stone, x, y } => {
                    write!(sgf, ";{}[{}{}]", color_tag(stone), coord(y), coord(x))
                }
                Move::Pass { stone } => write!(sgf, ";{}[]", color_tag(stone)),
            };
        }
        sgf.push(')');
        sgf
    }
}

fn color_tag(stone: Stone) -> char {
    match stone {
        Stone::Black => 'B',
        Stone::White => 'W',
    }
}

fn coord(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .and_then(|i| b'a'.checked_add(i))
        .map_or('?', char::from)
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace(']', "\\]")
}

/// `"White wins by time"` → `W+T`.
fn result_tag(winner: &str) -> Option<String> {
    let lower = winner.to_ascii_lowercase();
    let color = if lower.starts_with("black") {
        'B'
    } else if lower.starts_with("white") {
        'W'
    } else {
        return None;
    };
    let how = if lower.contains("time") {
        "T"
    } else if lower.contains("resign") {
        "R"
    } else {
        ""
    };
    Some(format!("{color}+{how}"))
}
