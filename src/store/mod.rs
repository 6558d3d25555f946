//! Persistence Store
//!
//! SQLite-backed durable storage for players, matches, turns, rankings and
//! rating history. The store owns a single connection and is only ever
//! called under the lobby lock, so each operation is one committed unit.

pub mod records;

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::game::{elo, GameKind};

pub use records::{
    HistoryEntry, MastermindFields, MatchRecord, PlayerRecord, RankingRecord, RatingChange,
    TopPlayerEntry, TurnMove, TurnRecord,
};

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A sequence column could not be encoded or decoded.
    #[error("record serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The durable store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self { conn };
        store.create_tables()?;
        info!("Store opened at {}", path.as_ref().display());
        Ok(store)
    }

    /// Open a private in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS players (
                pseudo TEXT PRIMARY KEY,
                ip TEXT,
                port INTEGER,
                join_date TEXT
            );

            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player1 TEXT,
                player2 TEXT,
                board TEXT,
                is_finished INTEGER,
                result TEXT,
                game_type TEXT DEFAULT 'morpion'
            );

            CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                match_id INTEGER,
                player TEXT,
                move TEXT,
                feedback TEXT,
                FOREIGN KEY (match_id) REFERENCES matches(id)
            );

            CREATE TABLE IF NOT EXISTS mastermind_matches (
                match_id INTEGER PRIMARY KEY,
                player1_code TEXT,
                player2_code TEXT,
                player1_guesses TEXT,
                player2_guesses TEXT,
                player1_feedback TEXT,
                player2_feedback TEXT,
                max_attempts INTEGER DEFAULT 10,
                FOREIGN KEY (match_id) REFERENCES matches(id)
            );

            CREATE TABLE IF NOT EXISTS player_rankings (
                pseudo TEXT PRIMARY KEY,
                elo_rating INTEGER DEFAULT 1200,
                games_played INTEGER DEFAULT 0,
                wins INTEGER DEFAULT 0,
                losses INTEGER DEFAULT 0,
                draws INTEGER DEFAULT 0,
                last_game_date TEXT,
                FOREIGN KEY (pseudo) REFERENCES players(pseudo)
            );

            CREATE TABLE IF NOT EXISTS ranking_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                match_id INTEGER,
                player_pseudo TEXT,
                old_rating INTEGER,
                new_rating INTEGER,
                rating_change INTEGER,
                match_date TEXT,
                FOREIGN KEY (match_id) REFERENCES matches(id),
                FOREIGN KEY (player_pseudo) REFERENCES players(pseudo)
            );
        ",
        )?;
        Ok(())
    }

    fn now_text() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Insert or refresh a player row, keyed on pseudo.
    pub fn upsert_player(&mut self, player: &PlayerRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO players (pseudo, ip, port, join_date)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pseudo) DO UPDATE SET
                 ip = excluded.ip,
                 port = excluded.port,
                 join_date = excluded.join_date",
            params![
                player.pseudo,
                player.ip,
                player.port,
                player
                    .join_date
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(())
    }

    /// Insert a match and return its assigned id. For Mastermind the
    /// specific-fields row is written in the same transaction.
    pub fn insert_match(&mut self, record: &MatchRecord) -> Result<i64, StoreError> {
        let board_json = match &record.board {
            Some(board) => serde_json::to_string(board)?,
            None => "[]".to_string(),
        };

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO matches (player1, player2, board, is_finished, result, game_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.player1,
                record.player2,
                board_json,
                record.is_finished,
                record.result,
                record.kind.as_str(),
            ],
        )?;
        let match_id = tx.last_insert_rowid();

        if let Some(mm) = &record.mastermind {
            tx.execute(
                "INSERT INTO mastermind_matches (
                     match_id, player1_code, player2_code,
                     player1_guesses, player2_guesses,
                     player1_feedback, player2_feedback, max_attempts
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    match_id,
                    serde_json::to_string(&mm.player1_code)?,
                    serde_json::to_string(&mm.player2_code)?,
                    serde_json::to_string(&mm.player1_guesses)?,
                    serde_json::to_string(&mm.player2_guesses)?,
                    serde_json::to_string(&mm.player1_feedback)?,
                    serde_json::to_string(&mm.player2_feedback)?,
                    mm.max_attempts as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(match_id)
    }

    /// Rewrite a match's mutable fields; cascades to the Mastermind row.
    pub fn update_match(&mut self, record: &MatchRecord) -> Result<(), StoreError> {
        let board_json = match &record.board {
            Some(board) => serde_json::to_string(board)?,
            None => "[]".to_string(),
        };

        self.conn.execute(
            "UPDATE matches SET board = ?1, is_finished = ?2, result = ?3 WHERE id = ?4",
            params![board_json, record.is_finished, record.result, record.id],
        )?;

        if record.mastermind.is_some() {
            self.update_mastermind_match(record)?;
        }
        Ok(())
    }

    /// Rewrite a Mastermind match's guess and feedback sequences.
    pub fn update_mastermind_match(&mut self, record: &MatchRecord) -> Result<(), StoreError> {
        let Some(mm) = &record.mastermind else {
            return Ok(());
        };
        self.conn.execute(
            "UPDATE mastermind_matches SET
                 player1_guesses = ?1, player2_guesses = ?2,
                 player1_feedback = ?3, player2_feedback = ?4
             WHERE match_id = ?5",
            params![
                serde_json::to_string(&mm.player1_guesses)?,
                serde_json::to_string(&mm.player2_guesses)?,
                serde_json::to_string(&mm.player1_feedback)?,
                serde_json::to_string(&mm.player2_feedback)?,
                record.id,
            ],
        )?;
        Ok(())
    }

    /// Append one turn to the journal.
    pub fn insert_turn(&mut self, turn: &TurnRecord) -> Result<(), StoreError> {
        let move_text = match &turn.mv {
            TurnMove::Position(pos) => pos.to_string(),
            TurnMove::Guess(guess) => serde_json::to_string(guess)?,
        };
        let feedback_text = match &turn.feedback {
            Some(fb) => Some(serde_json::to_string(fb)?),
            None => None,
        };
        self.conn.execute(
            "INSERT INTO turns (match_id, player, move, feedback) VALUES (?1, ?2, ?3, ?4)",
            params![turn.match_id, turn.player, move_text, feedback_text],
        )?;
        Ok(())
    }

    /// Fetch a player's ranking, initializing the row to defaults when the
    /// player has never been ranked.
    pub fn get_ranking(&mut self, pseudo: &str) -> Result<RankingRecord, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT elo_rating, games_played, wins, losses, draws, last_game_date
                 FROM player_rankings WHERE pseudo = ?1",
                params![pseudo],
                |row| {
                    Ok(RankingRecord {
                        pseudo: pseudo.to_string(),
                        elo_rating: row.get(0)?,
                        games_played: row.get(1)?,
                        wins: row.get(2)?,
                        losses: row.get(3)?,
                        draws: row.get(4)?,
                        last_game_date: row.get(5)?,
                    })
                },
            )
            .optional()?;

        if let Some(record) = row {
            return Ok(record);
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO player_rankings
                 (pseudo, elo_rating, games_played, wins, losses, draws)
             VALUES (?1, ?2, 0, 0, 0, 0)",
            params![pseudo, elo::INITIAL_RATING],
        )?;
        Ok(RankingRecord::initial(pseudo))
    }

    /// Apply the ELO update for a finished ranked match: both rating rows,
    /// win/loss/draw tallies, and two history entries, in one transaction.
    ///
    /// For a draw the winner/loser designation only selects argument order.
    pub fn update_rankings_after_match(
        &mut self,
        match_id: i64,
        winner: &str,
        loser: &str,
        is_draw: bool,
    ) -> Result<(RatingChange, RatingChange), StoreError> {
        let winner_ranking = self.get_ranking(winner)?;
        let loser_ranking = self.get_ranking(loser)?;

        let (new_winner_rating, new_loser_rating) = elo::rate_match(
            winner_ranking.elo_rating,
            loser_ranking.elo_rating,
            winner_ranking.games_played,
            loser_ranking.games_played,
            is_draw,
        );

        let now = Self::now_text();
        let tx = self.conn.transaction()?;

        let (winner_column, loser_column) = if is_draw {
            ("draws", "draws")
        } else {
            ("wins", "losses")
        };
        tx.execute(
            &format!(
                "UPDATE player_rankings
                 SET elo_rating = ?1, games_played = games_played + 1,
                     {winner_column} = {winner_column} + 1, last_game_date = ?2
                 WHERE pseudo = ?3"
            ),
            params![new_winner_rating, now, winner],
        )?;
        tx.execute(
            &format!(
                "UPDATE player_rankings
                 SET elo_rating = ?1, games_played = games_played + 1,
                     {loser_column} = {loser_column} + 1, last_game_date = ?2
                 WHERE pseudo = ?3"
            ),
            params![new_loser_rating, now, loser],
        )?;

        for (pseudo, old_rating, new_rating) in [
            (winner, winner_ranking.elo_rating, new_winner_rating),
            (loser, loser_ranking.elo_rating, new_loser_rating),
        ] {
            tx.execute(
                "INSERT INTO ranking_history
                     (match_id, player_pseudo, old_rating, new_rating, rating_change, match_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![match_id, pseudo, old_rating, new_rating, new_rating - old_rating, now],
            )?;
        }

        tx.commit()?;

        Ok((
            RatingChange {
                pseudo: winner.to_string(),
                old_rating: winner_ranking.elo_rating,
                new_rating: new_winner_rating,
            },
            RatingChange {
                pseudo: loser.to_string(),
                old_rating: loser_ranking.elo_rating,
                new_rating: new_loser_rating,
            },
        ))
    }

    /// The best ranked players with at least one game, ELO descending.
    pub fn top_players(&self, limit: u32) -> Result<Vec<TopPlayerEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT pseudo, elo_rating, games_played, wins, losses, draws
             FROM player_rankings
             WHERE games_played > 0
             ORDER BY elo_rating DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            let games_played: u32 = row.get(2)?;
            let wins: u32 = row.get(3)?;
            Ok(TopPlayerEntry {
                pseudo: row.get(0)?,
                elo_rating: row.get(1)?,
                games_played,
                wins,
                losses: row.get(4)?,
                draws: row.get(5)?,
                win_rate: if games_played > 0 {
                    (f64::from(wins) / f64::from(games_played) * 1000.0).round() / 10.0
                } else {
                    0.0
                },
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// 1-based rank of a player among all players with at least one game.
    pub fn rank_of(&self, pseudo: &str) -> Result<i64, StoreError> {
        let rank = self.conn.query_row(
            "SELECT COUNT(*) + 1
             FROM player_rankings
             WHERE elo_rating > (
                 SELECT elo_rating FROM player_rankings WHERE pseudo = ?1
             )
             AND games_played > 0",
            params![pseudo],
            |row| row.get(0),
        )?;
        Ok(rank)
    }

    /// A player's most recent ranked-match rating changes, newest first.
    pub fn history_of(&self, pseudo: &str, limit: u32) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT rh.match_id, rh.old_rating, rh.new_rating, rh.rating_change, rh.match_date,
                    m.player1, m.player2, m.result
             FROM ranking_history rh
             JOIN matches m ON rh.match_id = m.id
             WHERE rh.player_pseudo = ?1 AND m.game_type = 'mastermind'
             ORDER BY rh.match_date DESC, rh.id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pseudo, limit], |row| {
            let player1: String = row.get(5)?;
            let player2: String = row.get(6)?;
            let result: Option<String> = row.get(7)?;
            let opponent = if player1 == pseudo { player2 } else { player1 };
            let label = match result.as_deref() {
                Some(winner) if winner == pseudo => "Victoire",
                Some("draw") => "Match nul",
                _ => "Défaite",
            };
            Ok(HistoryEntry {
                match_id: row.get(0)?,
                old_rating: row.get(1)?,
                new_rating: row.get(2)?,
                rating_change: row.get(3)?,
                match_date: row.get(4)?,
                opponent,
                result: label.to_string(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
