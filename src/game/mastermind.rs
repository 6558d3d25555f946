//! Mastermind Rules
//!
//! Feedback scoring for a guess against a secret code. Both players guess
//! simultaneously against the opponent's code; the arbitrator owns attempt
//! counting and end-of-match decisions.

use serde::{Deserialize, Serialize};

/// Length of every secret code and guess.
pub const CODE_LENGTH: usize = 4;

/// Maximum guesses per player per match.
pub const MAX_ATTEMPTS: usize = 10;

/// The fixed color alphabet codes are drawn from.
pub const PALETTE: [Color; 6] = [
    Color::Red,
    Color::Green,
    Color::Blue,
    Color::Yellow,
    Color::Purple,
    Color::Orange,
];

/// A code peg color. Wire and storage form is the lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// "red"
    Red,
    /// "green"
    Green,
    /// "blue"
    Blue,
    /// "yellow"
    Yellow,
    /// "purple"
    Purple,
    /// "orange"
    Orange,
}

/// Result of scoring one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Black pins: right color in the right position.
    pub exact: usize,
    /// White pins: right color in a wrong position, multiplicity-matched.
    pub misplaced: usize,
}

impl Feedback {
    /// Whether this feedback means the guess equals the code.
    pub fn solves(&self, code_length: usize) -> bool {
        self.exact == code_length
    }
}

/// Score `guess` against `code`.
///
/// First pass counts exact matches and consumes both positions; second
/// pass counts misplaced colors, consuming each code position at most
/// once so duplicated colors are never over-counted. Both sequences must
/// have the same length; the arbitrator validates that before calling.
pub fn score(code: &[Color], guess: &[Color]) -> Feedback {
    debug_assert_eq!(code.len(), guess.len());

    let mut code_used = vec![false; code.len()];
    let mut guess_used = vec![false; guess.len()];

    let mut exact = 0;
    for i in 0..code.len().min(guess.len()) {
        if code[i] == guess[i] {
            exact += 1;
            code_used[i] = true;
            guess_used[i] = true;
        }
    }

    let mut misplaced = 0;
    for i in 0..guess.len() {
        if guess_used[i] {
            continue;
        }
        for j in 0..code.len() {
            if !code_used[j] && code[j] == guess[i] {
                misplaced += 1;
                code_used[j] = true;
                break;
            }
        }
    }

    Feedback { exact, misplaced }
}

/// Whether a sequence is a valid secret code or guess.
pub fn is_valid_code(code: &[Color]) -> bool {
    code.len() == CODE_LENGTH
}
