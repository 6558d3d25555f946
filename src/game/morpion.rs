//! Morpion Rules
//!
//! 3x3 board with positions numbered 0..8 row-major. The engine validates
//! and applies single moves and detects wins and draws; turn alternation
//! is enforced by the arbitrator, not here.

use serde::{Deserialize, Serialize};

/// Number of cells on the board.
pub const BOARD_CELLS: usize = 9;

/// The 8 winning lines: rows, columns, diagonals.
const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// A player's mark. Player 1 is always `X` and opens the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symbol {
    /// First player's mark.
    X,
    /// Second player's mark.
    O,
}

impl Symbol {
    /// The mark of the other player.
    pub fn opponent(self) -> Symbol {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

/// Terminal state of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Three in a line for this symbol.
    Win(Symbol),
    /// Board full with no winning line.
    Draw,
}

/// The 9-cell board. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [Option<Symbol>; BOARD_CELLS],
}

impl Board {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a move if it is valid: `position` in range and the cell empty.
    /// Returns whether the board was mutated.
    pub fn play(&mut self, position: usize, symbol: Symbol) -> bool {
        match self.cells.get(position) {
            Some(None) => {
                self.cells[position] = Some(symbol);
                true
            }
            _ => false,
        }
    }

    /// Check for a terminal state. `None` means the game continues.
    pub fn outcome(&self) -> Option<Outcome> {
        for line in &WIN_LINES {
            if let Some(symbol) = self.cells[line[0]] {
                if self.cells[line[1]] == Some(symbol) && self.cells[line[2]] == Some(symbol) {
                    return Some(Outcome::Win(symbol));
                }
            }
        }
        if self.cells.iter().all(|c| c.is_some()) {
            return Some(Outcome::Draw);
        }
        None
    }

    /// Read access to the raw cells.
    pub fn cells(&self) -> &[Option<Symbol>; BOARD_CELLS] {
        &self.cells
    }

    /// Number of cells holding the given symbol.
    pub fn count(&self, symbol: Symbol) -> usize {
        self.cells.iter().filter(|c| **c == Some(symbol)).count()
    }
}
