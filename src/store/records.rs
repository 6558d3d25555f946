//! Persisted record types
//!
//! Explicit record structs for everything the store writes or returns.
//! Sequence-valued fields are serialized as JSON arrays in text columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::mastermind::{Color, Feedback};
use crate::game::morpion::Board;
use crate::game::GameKind;

/// A connected (or previously seen) player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    /// Unique display name; the identity key.
    pub pseudo: String,
    /// Remote address the player connected from.
    pub ip: String,
    /// Remote port.
    pub port: u16,
    /// When the player connected.
    pub join_date: DateTime<Utc>,
}

/// A match row, common fields plus the Mastermind-specific arm.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    /// Store-assigned id; 0 before the first insert.
    pub id: i64,
    /// First-queued player.
    pub player1: String,
    /// Second-queued player.
    pub player2: String,
    /// Morpion board; `None` for Mastermind (stored as an empty array).
    pub board: Option<Board>,
    /// Whether the match has reached a terminal state.
    pub is_finished: bool,
    /// Winner pseudo, `"draw"`, `"interrupted"`, or `None` while active.
    pub result: Option<String>,
    /// Which game this match is.
    pub kind: GameKind,
    /// Present iff `kind` is Mastermind.
    pub mastermind: Option<MastermindFields>,
}

/// Mastermind-specific persisted fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MastermindFields {
    /// Player 1's secret code.
    pub player1_code: Vec<Color>,
    /// Player 2's secret code.
    pub player2_code: Vec<Color>,
    /// Player 1's guesses, in order.
    pub player1_guesses: Vec<Vec<Color>>,
    /// Player 2's guesses, in order.
    pub player2_guesses: Vec<Vec<Color>>,
    /// Feedback for player 1's guesses, index-aligned.
    pub player1_feedback: Vec<Feedback>,
    /// Feedback for player 2's guesses, index-aligned.
    pub player2_feedback: Vec<Feedback>,
    /// Per-player guess limit.
    pub max_attempts: usize,
}

/// What a turn journal entry recorded as the move.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnMove {
    /// Morpion board position, 0..8.
    Position(usize),
    /// Mastermind guess sequence.
    Guess(Vec<Color>),
}

/// One append-only turn journal entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRecord {
    /// Match this turn belongs to.
    pub match_id: i64,
    /// Acting player.
    pub player: String,
    /// The move itself.
    pub mv: TurnMove,
    /// Mastermind feedback, if any.
    pub feedback: Option<Feedback>,
}

/// A player's ranking row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRecord {
    /// Player this ranking belongs to.
    pub pseudo: String,
    /// Current ELO rating.
    pub elo_rating: i32,
    /// Ranked matches played.
    pub games_played: u32,
    /// Ranked wins.
    pub wins: u32,
    /// Ranked losses.
    pub losses: u32,
    /// Ranked draws.
    pub draws: u32,
    /// ISO-8601 date of the last ranked match, if any.
    pub last_game_date: Option<String>,
}

impl RankingRecord {
    /// Fresh ranking for a player with no ranked history.
    pub fn initial(pseudo: &str) -> Self {
        Self {
            pseudo: pseudo.to_string(),
            elo_rating: crate::game::elo::INITIAL_RATING,
            games_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            last_game_date: None,
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPlayerEntry {
    /// Player.
    pub pseudo: String,
    /// Current ELO rating.
    pub elo_rating: i32,
    /// Ranked matches played.
    pub games_played: u32,
    /// Ranked wins.
    pub wins: u32,
    /// Ranked losses.
    pub losses: u32,
    /// Ranked draws.
    pub draws: u32,
    /// Win percentage rounded to one decimal.
    pub win_rate: f64,
}

/// One rating-history row as shown to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Match the change came from.
    pub match_id: i64,
    /// Rating before the match.
    pub old_rating: i32,
    /// Rating after the match.
    pub new_rating: i32,
    /// Signed delta.
    pub rating_change: i32,
    /// When the match finalized (ISO-8601).
    pub match_date: String,
    /// The other participant.
    pub opponent: String,
    /// Localized outcome label: "Victoire", "Défaite" or "Match nul".
    pub result: String,
}

/// Applied rating change for one participant of a ranked match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingChange {
    /// Player the change applies to.
    pub pseudo: String,
    /// Rating before the update.
    pub old_rating: i32,
    /// Rating after the update.
    pub new_rating: i32,
}
