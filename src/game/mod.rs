//! Game logic module
//!
//! Pure rule engines for both supported games plus the rating engine.
//! Nothing in here touches the network or the store; the arbitrator in
//! `network::lobby` drives these types and owns turn discipline.

pub mod elo;
pub mod mastermind;
pub mod morpion;

use serde::{Deserialize, Serialize};

/// The two games the server can arbitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    /// 3x3 tic-tac-toe variant with strict turn alternation.
    Morpion,
    /// 1-vs-1 simultaneous code-breaking duel.
    Mastermind,
}

impl GameKind {
    /// Stable identifier used in the `matches.game_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            GameKind::Morpion => "morpion",
            GameKind::Mastermind => "mastermind",
        }
    }
}
