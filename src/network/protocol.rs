//! Protocol Messages
//!
//! Wire format for client-server communication over TCP. Every message is
//! a UTF-8 JSON object with an `action` discriminator, one object per
//! newline-delimited frame.

use serde::{Deserialize, Serialize};

use crate::game::mastermind::Color;
use crate::game::morpion::Symbol;
use crate::store::records::{HistoryEntry, RankingRecord, TopPlayerEntry};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    /// Claim a pseudo for this connection.
    #[serde(rename = "CONNECT")]
    Connect {
        /// Requested display name.
        pseudo: String,
        /// Optional preferred game hint sent by older clients; ignored.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game: Option<String>,
    },

    /// Join the Morpion matchmaking queue.
    #[serde(rename = "JOIN")]
    Join {
        /// Sender's pseudo; must match the authenticated one.
        pseudo: String,
    },

    /// Leave the Morpion matchmaking queue.
    #[serde(rename = "LEAVE")]
    Leave {
        /// Sender's pseudo; must match the authenticated one.
        pseudo: String,
    },

    /// Join the Mastermind queue with a secret code for the opponent.
    #[serde(rename = "JOIN_MASTERMIND")]
    JoinMastermind {
        /// Sender's pseudo; must match the authenticated one.
        pseudo: String,
        /// Secret code the opponent will have to break.
        code: Vec<Color>,
    },

    /// Leave the Mastermind queue and discard the stashed code.
    #[serde(rename = "LEAVE_MASTERMIND")]
    LeaveMastermind {
        /// Sender's pseudo; must match the authenticated one.
        pseudo: String,
    },

    /// Play a Morpion move.
    #[serde(rename = "MOVE")]
    Move {
        /// Sender's pseudo; must match the authenticated one.
        pseudo: String,
        /// Live match id.
        match_id: i64,
        /// Board position, 0..8 row-major.
        position: usize,
    },

    /// Submit a Mastermind guess.
    #[serde(rename = "MASTERMIND_GUESS")]
    MastermindGuess {
        /// Sender's pseudo; must match the authenticated one.
        pseudo: String,
        /// Live match id.
        match_id: i64,
        /// The guessed code.
        guess: Vec<Color>,
    },

    /// Request the sender's ranking record.
    #[serde(rename = "GET_PLAYER_RANKING")]
    GetPlayerRanking {
        /// Player to look up.
        pseudo: String,
    },

    /// Request the sender's leaderboard rank.
    #[serde(rename = "GET_PLAYER_RANK")]
    GetPlayerRank {
        /// Player to look up.
        pseudo: String,
    },

    /// Request the leaderboard.
    #[serde(rename = "GET_TOP_PLAYERS")]
    GetTopPlayers,

    /// Request the sender's recent rating history.
    #[serde(rename = "GET_PLAYER_HISTORY")]
    GetPlayerHistory {
        /// Player to look up.
        pseudo: String,
    },
}

impl ClientMessage {
    /// The `pseudo` field carried by the message, if any.
    pub fn pseudo(&self) -> Option<&str> {
        match self {
            ClientMessage::Connect { pseudo, .. }
            | ClientMessage::Join { pseudo }
            | ClientMessage::Leave { pseudo }
            | ClientMessage::JoinMastermind { pseudo, .. }
            | ClientMessage::LeaveMastermind { pseudo }
            | ClientMessage::Move { pseudo, .. }
            | ClientMessage::MastermindGuess { pseudo, .. }
            | ClientMessage::GetPlayerRanking { pseudo }
            | ClientMessage::GetPlayerRank { pseudo }
            | ClientMessage::GetPlayerHistory { pseudo } => Some(pseudo),
            ClientMessage::GetTopPlayers => None,
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Outcome of a CONNECT request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectStatus {
    /// Pseudo claimed.
    #[serde(rename = "OK")]
    Ok,
    /// Pseudo rejected; see the accompanying message.
    #[serde(rename = "ERROR")]
    Error,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ServerMessage {
    /// Reply to a CONNECT request.
    #[serde(rename = "CONNECT")]
    Connect {
        /// OK or ERROR.
        status: ConnectStatus,
        /// Reason when rejected.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// A Morpion match begins.
    #[serde(rename = "START")]
    Start {
        /// Opponent pseudo.
        opponent: String,
        /// Match id for subsequent MOVE messages.
        match_id: i64,
        /// The receiver's assigned mark; X opens.
        symbol: Symbol,
    },

    /// The opponent played a Morpion move.
    #[serde(rename = "MOVE")]
    Move {
        /// Board position, 0..8.
        position: usize,
        /// Mark placed there.
        symbol: Symbol,
    },

    /// A Morpion match finished.
    #[serde(rename = "END")]
    End {
        /// Winner pseudo or "draw".
        result: String,
    },

    /// The receiver was removed from a matchmaking queue.
    #[serde(rename = "LEFT_QUEUE")]
    LeftQueue,

    /// The opponent disconnected; the match is cancelled.
    #[serde(rename = "MATCH_INTERRUPTED")]
    MatchInterrupted {
        /// Human-readable explanation.
        message: String,
    },

    /// A Mastermind match begins.
    #[serde(rename = "MASTERMIND_START")]
    MastermindStart {
        /// Opponent pseudo.
        opponent: String,
        /// Match id for subsequent guesses.
        match_id: i64,
    },

    /// Feedback for the receiver's own guess.
    #[serde(rename = "MASTERMIND_FEEDBACK")]
    MastermindFeedback {
        /// Exact matches.
        black_pins: usize,
        /// Misplaced colors.
        white_pins: usize,
        /// 1-based index of the guess this scores.
        guess_number: usize,
    },

    /// The opponent submitted a guess.
    #[serde(rename = "MASTERMIND_OPPONENT_GUESS")]
    MastermindOpponentGuess {
        /// The opponent's guess.
        guess: Vec<Color>,
        /// Exact matches it scored.
        black_pins: usize,
        /// Misplaced colors it scored.
        white_pins: usize,
        /// 1-based index of the opponent's guess.
        guess_number: usize,
    },

    /// A Mastermind match finished; both codes are revealed.
    #[serde(rename = "MASTERMIND_END")]
    MastermindEnd {
        /// Winner pseudo, "draw" or "interrupted".
        result: String,
        /// Player 1's secret code.
        player1_code: Vec<Color>,
        /// Player 2's secret code.
        player2_code: Vec<Color>,
    },

    /// The receiver's rating changed after a ranked match.
    #[serde(rename = "RATING_UPDATE")]
    RatingUpdate {
        /// Rating before the match.
        old_rating: i32,
        /// Rating after the match.
        new_rating: i32,
    },

    /// Reply to GET_PLAYER_RANKING.
    #[serde(rename = "PLAYER_RANKING")]
    PlayerRanking {
        /// The full ranking record.
        ranking_data: RankingRecord,
    },

    /// Reply to GET_PLAYER_RANK.
    #[serde(rename = "PLAYER_RANK")]
    PlayerRank {
        /// 1-based leaderboard rank.
        rank: i64,
    },

    /// Reply to GET_TOP_PLAYERS.
    #[serde(rename = "TOP_PLAYERS")]
    TopPlayers {
        /// Leaderboard rows, best first.
        players: Vec<TopPlayerEntry>,
    },

    /// Reply to GET_PLAYER_HISTORY.
    #[serde(rename = "PLAYER_HISTORY")]
    PlayerHistory {
        /// Recent rating changes, newest first.
        history: Vec<HistoryEntry>,
    },
}
