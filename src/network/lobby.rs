//! Lobby
//!
//! The single owned state struct behind the core lock: the live-client
//! table, both matchmaking queues, the stashed Mastermind codes, the
//! live-match registry, and the persistence store. Sessions lock the
//! lobby, mutate, and every outbound message goes through the recipient
//! session's bounded mailbox with a non-blocking send.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::game::mastermind::{self, Color, Feedback, MAX_ATTEMPTS};
use crate::game::morpion::{Board, Outcome, Symbol};
use crate::game::GameKind;
use crate::network::protocol::ServerMessage;
use crate::store::records::{
    HistoryEntry, MastermindFields, MatchRecord, PlayerRecord, RankingRecord, TopPlayerEntry,
    TurnMove, TurnRecord,
};
use crate::store::{Store, StoreError};

/// Leaderboard rows returned for GET_TOP_PLAYERS.
const LEADERBOARD_LIMIT: u32 = 10;

/// History rows returned for GET_PLAYER_HISTORY.
const HISTORY_LIMIT: u32 = 10;

/// Why a CONNECT was refused. The display text is the wire `message`.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Empty pseudo.
    #[error("Pseudo invalide.")]
    InvalidPseudo,

    /// Another live session already holds this pseudo.
    #[error("Pseudo déjà pris.")]
    PseudoTaken,

    /// The player row could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Terminal result of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MatchResult {
    /// This pseudo won.
    Winner(String),
    /// Neither side won.
    Draw,
    /// A participant disconnected mid-match.
    Interrupted,
}

impl MatchResult {
    fn as_wire(&self) -> String {
        match self {
            MatchResult::Winner(pseudo) => pseudo.clone(),
            MatchResult::Draw => "draw".to_string(),
            MatchResult::Interrupted => "interrupted".to_string(),
        }
    }
}

/// A connected, authenticated session.
struct ClientHandle {
    sender: mpsc::Sender<ServerMessage>,
    ip: String,
    port: u16,
}

/// FIFO matchmaking queue with O(log n) removal.
///
/// Join order is a monotone sequence number; the pseudo index makes
/// LEAVE cheap instead of rebuilding the queue.
#[derive(Default)]
struct WaitingQueue {
    next_seq: u64,
    order: BTreeMap<u64, String>,
    index: HashMap<String, u64>,
}

impl WaitingQueue {
    fn push(&mut self, pseudo: &str) -> bool {
        if self.index.contains_key(pseudo) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, pseudo.to_string());
        self.index.insert(pseudo.to_string(), seq);
        true
    }

    fn remove(&mut self, pseudo: &str) -> bool {
        match self.index.remove(pseudo) {
            Some(seq) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }

    fn contains(&self, pseudo: &str) -> bool {
        self.index.contains_key(pseudo)
    }

    /// The two players at the head, in join order, without removing them.
    fn front_two(&self) -> Option<(String, String)> {
        let mut heads = self.order.values();
        let first = heads.next()?.clone();
        let second = heads.next()?.clone();
        Some((first, second))
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Per-match Mastermind state.
struct MastermindGame {
    /// Secret codes, indexed by side (0 = player1).
    codes: [Vec<Color>; 2],
    /// Guesses per side, in order.
    guesses: [Vec<Vec<Color>>; 2],
    /// Feedback per side, index-aligned with guesses.
    feedback: [Vec<Feedback>; 2],
    max_attempts: usize,
}

impl MastermindGame {
    fn new(player1_code: Vec<Color>, player2_code: Vec<Color>) -> Self {
        Self {
            codes: [player1_code, player2_code],
            guesses: [Vec::new(), Vec::new()],
            feedback: [Vec::new(), Vec::new()],
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// Game-specific live state, tagged by kind.
enum GameState {
    Morpion {
        board: Board,
        /// Whose turn it is; X opens.
        next: Symbol,
    },
    Mastermind(MastermindGame),
}

/// One entry of the live-match registry.
struct LiveMatch {
    id: i64,
    player1: String,
    player2: String,
    finished: bool,
    result: Option<MatchResult>,
    game: GameState,
}

impl LiveMatch {
    /// 0 for player1, 1 for player2, `None` for everyone else.
    fn side_of(&self, pseudo: &str) -> Option<usize> {
        if self.player1 == pseudo {
            Some(0)
        } else if self.player2 == pseudo {
            Some(1)
        } else {
            None
        }
    }

    fn involves(&self, pseudo: &str) -> bool {
        self.side_of(pseudo).is_some()
    }

    fn opponent_of(&self, pseudo: &str) -> &str {
        if self.player1 == pseudo {
            &self.player2
        } else {
            &self.player1
        }
    }

    /// Snapshot for the store.
    fn record(&self) -> MatchRecord {
        let (board, kind, mm) = match &self.game {
            GameState::Morpion { board, .. } => (Some(board.clone()), GameKind::Morpion, None),
            GameState::Mastermind(game) => (
                None,
                GameKind::Mastermind,
                Some(MastermindFields {
                    player1_code: game.codes[0].clone(),
                    player2_code: game.codes[1].clone(),
                    player1_guesses: game.guesses[0].clone(),
                    player2_guesses: game.guesses[1].clone(),
                    player1_feedback: game.feedback[0].clone(),
                    player2_feedback: game.feedback[1].clone(),
                    max_attempts: game.max_attempts,
                }),
            ),
        };
        MatchRecord {
            id: self.id,
            player1: self.player1.clone(),
            player2: self.player2.clone(),
            board,
            is_finished: self.finished,
            result: self.result.as_ref().map(MatchResult::as_wire),
            kind,
            mastermind: mm,
        }
    }
}

/// The core state, exactly one per server, protected by one lock.
pub struct Lobby {
    clients: HashMap<String, ClientHandle>,
    morpion_queue: WaitingQueue,
    mastermind_queue: WaitingQueue,
    stashed_codes: HashMap<String, Vec<Color>>,
    matches: HashMap<i64, LiveMatch>,
    store: Store,
}

impl Lobby {
    /// Create a lobby over an opened store.
    pub fn new(store: Store) -> Self {
        Self {
            clients: HashMap::new(),
            morpion_queue: WaitingQueue::default(),
            mastermind_queue: WaitingQueue::default(),
            stashed_codes: HashMap::new(),
            matches: HashMap::new(),
            store,
        }
    }

    /// Number of live, authenticated sessions.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Number of live matches.
    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Players waiting for a Morpion match.
    pub fn morpion_queue_len(&self) -> usize {
        self.morpion_queue.len()
    }

    /// Players waiting for a Mastermind match.
    pub fn mastermind_queue_len(&self) -> usize {
        self.mastermind_queue.len()
    }

    /// Queue a message to one session's mailbox without blocking. A full
    /// mailbox or a vanished session drops the message; the peer will be
    /// discovered dead on its own socket.
    fn send(clients: &HashMap<String, ClientHandle>, pseudo: &str, msg: ServerMessage) {
        match clients.get(pseudo) {
            Some(handle) => {
                if let Err(e) = handle.sender.try_send(msg) {
                    warn!("Failed to queue message for {pseudo}: {e}");
                }
            }
            None => debug!("No live session for {pseudo}; message dropped"),
        }
    }

    /// Queue a message to one session. Used for request replies.
    pub fn send_to(&self, pseudo: &str, msg: ServerMessage) {
        Self::send(&self.clients, pseudo, msg);
    }

    /// Claim a pseudo for a new session and persist the player.
    pub fn register(
        &mut self,
        pseudo: &str,
        ip: String,
        port: u16,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(), ConnectError> {
        if pseudo.is_empty() {
            return Err(ConnectError::InvalidPseudo);
        }
        if self.clients.contains_key(pseudo) {
            return Err(ConnectError::PseudoTaken);
        }
        self.store.upsert_player(&PlayerRecord {
            pseudo: pseudo.to_string(),
            ip: ip.clone(),
            port,
            join_date: Utc::now(),
        })?;
        info!("{pseudo} connected from {ip}:{port}");
        self.clients
            .insert(pseudo.to_string(), ClientHandle { sender, ip, port });
        Ok(())
    }

    /// Whether a player is waiting in a queue or playing a match.
    fn is_engaged(&self, pseudo: &str) -> bool {
        self.morpion_queue.contains(pseudo)
            || self.mastermind_queue.contains(pseudo)
            || self.matches.values().any(|m| m.involves(pseudo))
    }

    fn refresh_player(&mut self, pseudo: &str) -> Result<(), StoreError> {
        let Some((ip, port)) = self.clients.get(pseudo).map(|h| (h.ip.clone(), h.port)) else {
            return Ok(());
        };
        self.store.upsert_player(&PlayerRecord {
            pseudo: pseudo.to_string(),
            ip,
            port,
            join_date: Utc::now(),
        })
    }

    /// JOIN: enqueue for Morpion and pair if two players are waiting.
    pub fn join_morpion(&mut self, pseudo: &str) -> Result<(), StoreError> {
        if !self.clients.contains_key(pseudo) {
            return Ok(());
        }
        if self.is_engaged(pseudo) {
            debug!("{pseudo} is already queued or playing; JOIN dropped");
            return Ok(());
        }
        self.refresh_player(pseudo)?;
        self.morpion_queue.push(pseudo);
        self.try_pair_morpion()
    }

    /// LEAVE: drop out of the Morpion queue.
    pub fn leave_morpion(&mut self, pseudo: &str) {
        if self.morpion_queue.remove(pseudo) {
            info!("{pseudo} left the Morpion queue");
            Self::send(&self.clients, pseudo, ServerMessage::LeftQueue);
        }
    }

    /// JOIN_MASTERMIND: stash the secret code, enqueue, pair if possible.
    pub fn join_mastermind(&mut self, pseudo: &str, code: Vec<Color>) -> Result<(), StoreError> {
        if !self.clients.contains_key(pseudo) {
            return Ok(());
        }
        if self.is_engaged(pseudo) {
            debug!("{pseudo} is already queued or playing; JOIN_MASTERMIND dropped");
            return Ok(());
        }
        if !mastermind::is_valid_code(&code) {
            debug!("{pseudo} submitted a code of length {}; dropped", code.len());
            return Ok(());
        }
        self.refresh_player(pseudo)?;
        self.stashed_codes.insert(pseudo.to_string(), code);
        self.mastermind_queue.push(pseudo);
        self.try_pair_mastermind()
    }

    /// LEAVE_MASTERMIND: drop out of the queue and discard the code.
    pub fn leave_mastermind(&mut self, pseudo: &str) {
        if self.mastermind_queue.remove(pseudo) {
            info!("{pseudo} left the Mastermind queue");
            Self::send(&self.clients, pseudo, ServerMessage::LeftQueue);
        }
        self.stashed_codes.remove(pseudo);
    }

    fn try_pair_morpion(&mut self) -> Result<(), StoreError> {
        let Some((player1, player2)) = self.morpion_queue.front_two() else {
            return Ok(());
        };

        let mut live = LiveMatch {
            id: 0,
            player1: player1.clone(),
            player2: player2.clone(),
            finished: false,
            result: None,
            game: GameState::Morpion {
                board: Board::new(),
                next: Symbol::X,
            },
        };
        // Dequeue only once the store has committed the match.
        live.id = self.store.insert_match(&live.record())?;
        self.morpion_queue.remove(&player1);
        self.morpion_queue.remove(&player2);

        info!("Morpion match {} created: {player1} vs {player2}", live.id);
        Self::send(
            &self.clients,
            &player1,
            ServerMessage::Start {
                opponent: player2.clone(),
                match_id: live.id,
                symbol: Symbol::X,
            },
        );
        Self::send(
            &self.clients,
            &player2,
            ServerMessage::Start {
                opponent: player1.clone(),
                match_id: live.id,
                symbol: Symbol::O,
            },
        );
        self.matches.insert(live.id, live);
        Ok(())
    }

    fn try_pair_mastermind(&mut self) -> Result<(), StoreError> {
        let Some((player1, player2)) = self.mastermind_queue.front_two() else {
            return Ok(());
        };

        let code1 = self.stashed_codes.get(&player1).cloned().unwrap_or_default();
        let code2 = self.stashed_codes.get(&player2).cloned().unwrap_or_default();

        let mut live = LiveMatch {
            id: 0,
            player1: player1.clone(),
            player2: player2.clone(),
            finished: false,
            result: None,
            game: GameState::Mastermind(MastermindGame::new(code1, code2)),
        };
        live.id = self.store.insert_match(&live.record())?;
        self.mastermind_queue.remove(&player1);
        self.mastermind_queue.remove(&player2);
        self.stashed_codes.remove(&player1);
        self.stashed_codes.remove(&player2);

        info!("Mastermind match {} created: {player1} vs {player2}", live.id);
        Self::send(
            &self.clients,
            &player1,
            ServerMessage::MastermindStart {
                opponent: player2.clone(),
                match_id: live.id,
            },
        );
        Self::send(
            &self.clients,
            &player2,
            ServerMessage::MastermindStart {
                opponent: player1.clone(),
                match_id: live.id,
            },
        );
        self.matches.insert(live.id, live);
        Ok(())
    }

    /// MOVE: arbitrate one Morpion move.
    pub fn morpion_move(
        &mut self,
        pseudo: &str,
        match_id: i64,
        position: usize,
    ) -> Result<(), StoreError> {
        let Some(live) = self.matches.get_mut(&match_id) else {
            debug!("MOVE from {pseudo} for unknown match {match_id}; dropped");
            return Ok(());
        };
        if live.finished {
            return Ok(());
        }
        let Some(side) = live.side_of(pseudo) else {
            debug!("MOVE from non-participant {pseudo} for match {match_id}; dropped");
            return Ok(());
        };
        let opponent = live.opponent_of(pseudo).to_string();
        let player1 = live.player1.clone();
        let player2 = live.player2.clone();

        let GameState::Morpion { board, next } = &mut live.game else {
            debug!("MOVE for non-Morpion match {match_id}; dropped");
            return Ok(());
        };
        let symbol = if side == 0 { Symbol::X } else { Symbol::O };
        if *next != symbol {
            debug!("{pseudo} played out of turn in match {match_id}; dropped");
            return Ok(());
        }
        if !board.play(position, symbol) {
            debug!("{pseudo} played invalid position {position} in match {match_id}; dropped");
            return Ok(());
        }
        *next = symbol.opponent();

        if let Some(outcome) = board.outcome() {
            live.finished = true;
            live.result = Some(match outcome {
                Outcome::Win(Symbol::X) => MatchResult::Winner(player1.clone()),
                Outcome::Win(Symbol::O) => MatchResult::Winner(player2.clone()),
                Outcome::Draw => MatchResult::Draw,
            });
        }
        let record = live.record();
        let finished = live.finished;
        let result_wire = live.result.as_ref().map(MatchResult::as_wire);

        self.store.insert_turn(&TurnRecord {
            match_id,
            player: pseudo.to_string(),
            mv: TurnMove::Position(position),
            feedback: None,
        })?;
        self.store.update_match(&record)?;

        Self::send(
            &self.clients,
            &opponent,
            ServerMessage::Move { position, symbol },
        );

        if finished {
            if let Some(result) = result_wire {
                info!("Morpion match {match_id} finished: {result}");
                Self::send(
                    &self.clients,
                    &player1,
                    ServerMessage::End {
                        result: result.clone(),
                    },
                );
                Self::send(&self.clients, &player2, ServerMessage::End { result });
            }
            self.matches.remove(&match_id);
        }
        Ok(())
    }

    /// MASTERMIND_GUESS: score one guess and arbitrate the end of match.
    pub fn mastermind_guess(
        &mut self,
        pseudo: &str,
        match_id: i64,
        guess: Vec<Color>,
    ) -> Result<(), StoreError> {
        let Some(live) = self.matches.get_mut(&match_id) else {
            debug!("MASTERMIND_GUESS from {pseudo} for unknown match {match_id}; dropped");
            return Ok(());
        };
        if live.finished {
            return Ok(());
        }
        let Some(side) = live.side_of(pseudo) else {
            debug!(
                "MASTERMIND_GUESS from non-participant {pseudo} for match {match_id}; dropped"
            );
            return Ok(());
        };
        let opponent = live.opponent_of(pseudo).to_string();
        let player1 = live.player1.clone();
        let player2 = live.player2.clone();

        let GameState::Mastermind(game) = &mut live.game else {
            debug!("MASTERMIND_GUESS for non-Mastermind match {match_id}; dropped");
            return Ok(());
        };
        let other = 1 - side;
        let code_length = game.codes[other].len();
        if guess.len() != code_length {
            debug!("{pseudo} guessed with wrong length in match {match_id}; dropped");
            return Ok(());
        }
        if game.guesses[side].len() >= game.max_attempts {
            debug!("{pseudo} is out of attempts in match {match_id}; dropped");
            return Ok(());
        }

        let feedback = mastermind::score(&game.codes[other], &guess);
        game.guesses[side].push(guess.clone());
        game.feedback[side].push(feedback);
        let guess_number = game.guesses[side].len();

        // Guesses are serialized under the core lock and a solve finalizes
        // the match immediately, so the first solve the arbitrator sees
        // wins; the other side's in-flight guess finds the match gone and
        // is dropped. Exhaustion on both sides draws.
        let result = if feedback.solves(code_length) {
            Some(MatchResult::Winner(pseudo.to_string()))
        } else if game.guesses[0].len() >= game.max_attempts
            && game.guesses[1].len() >= game.max_attempts
        {
            Some(MatchResult::Draw)
        } else {
            None
        };

        let player1_code = game.codes[0].clone();
        let player2_code = game.codes[1].clone();
        if let Some(result) = &result {
            live.finished = true;
            live.result = Some(result.clone());
        }
        let record = live.record();

        self.store.insert_turn(&TurnRecord {
            match_id,
            player: pseudo.to_string(),
            mv: TurnMove::Guess(guess.clone()),
            feedback: Some(feedback),
        })?;
        self.store.update_mastermind_match(&record)?;

        Self::send(
            &self.clients,
            pseudo,
            ServerMessage::MastermindFeedback {
                black_pins: feedback.exact,
                white_pins: feedback.misplaced,
                guess_number,
            },
        );
        Self::send(
            &self.clients,
            &opponent,
            ServerMessage::MastermindOpponentGuess {
                guess,
                black_pins: feedback.exact,
                white_pins: feedback.misplaced,
                guess_number,
            },
        );

        let Some(result) = result else {
            return Ok(());
        };
        self.store.update_match(&record)?;

        let wire = result.as_wire();
        info!("Mastermind match {match_id} finished: {wire}");
        for participant in [&player1, &player2] {
            Self::send(
                &self.clients,
                participant,
                ServerMessage::MastermindEnd {
                    result: wire.clone(),
                    player1_code: player1_code.clone(),
                    player2_code: player2_code.clone(),
                },
            );
        }

        if result != MatchResult::Interrupted {
            let (winner, loser, is_draw) = match &result {
                MatchResult::Winner(w) if *w == player1 => (player1.clone(), player2.clone(), false),
                MatchResult::Winner(_) => (player2.clone(), player1.clone(), false),
                _ => (player1.clone(), player2.clone(), true),
            };
            let (winner_change, loser_change) =
                self.store
                    .update_rankings_after_match(match_id, &winner, &loser, is_draw)?;
            for change in [winner_change, loser_change] {
                Self::send(
                    &self.clients,
                    &change.pseudo,
                    ServerMessage::RatingUpdate {
                        old_rating: change.old_rating,
                        new_rating: change.new_rating,
                    },
                );
            }
        }

        self.matches.remove(&match_id);
        Ok(())
    }

    /// GET_PLAYER_RANKING.
    pub fn ranking(&mut self, pseudo: &str) -> Result<RankingRecord, StoreError> {
        self.store.get_ranking(pseudo)
    }

    /// GET_PLAYER_RANK.
    pub fn rank(&self, pseudo: &str) -> Result<i64, StoreError> {
        self.store.rank_of(pseudo)
    }

    /// GET_TOP_PLAYERS.
    pub fn top_players(&self) -> Result<Vec<TopPlayerEntry>, StoreError> {
        self.store.top_players(LEADERBOARD_LIMIT)
    }

    /// GET_PLAYER_HISTORY.
    pub fn history(&self, pseudo: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        self.store.history_of(pseudo, HISTORY_LIMIT)
    }

    /// Tear down one session: evict from queues, discard the stashed code,
    /// interrupt live matches and tell surviving opponents.
    pub fn disconnect(&mut self, pseudo: &str) {
        if self.clients.remove(pseudo).is_none() {
            return;
        }
        self.stashed_codes.remove(pseudo);
        self.morpion_queue.remove(pseudo);
        self.mastermind_queue.remove(pseudo);

        let affected: Vec<i64> = self
            .matches
            .values()
            .filter(|m| m.involves(pseudo))
            .map(|m| m.id)
            .collect();
        for match_id in affected {
            self.interrupt_match(
                match_id,
                &format!("Votre adversaire ({pseudo}) s'est déconnecté. Le match est annulé."),
            );
        }
        info!("{pseudo} disconnected");
    }

    /// Interrupt every live match. Called on server shutdown so nothing
    /// is ever finalized as a win.
    pub fn shutdown_all(&mut self) {
        let ids: Vec<i64> = self.matches.keys().copied().collect();
        for match_id in ids {
            self.interrupt_match(match_id, "Le serveur s'arrête. Le match est annulé.");
        }
    }

    fn interrupt_match(&mut self, match_id: i64, message: &str) {
        let Some(mut live) = self.matches.remove(&match_id) else {
            return;
        };
        live.finished = true;
        live.result = Some(MatchResult::Interrupted);
        if let Err(e) = self.store.update_match(&live.record()) {
            error!("Failed to persist interruption of match {match_id}: {e}");
        }
        // Interrupted matches never touch rankings.
        for participant in [&live.player1, &live.player2] {
            if self.clients.contains_key(participant.as_str()) {
                Self::send(
                    &self.clients,
                    participant,
                    ServerMessage::MatchInterrupted {
                        message: message.to_string(),
                    },
                );
            }
        }
        info!("Match {match_id} interrupted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mastermind::Color::*;
    use crate::network::protocol::ConnectStatus;

    fn lobby() -> Lobby {
        Lobby::new(Store::open_in_memory().expect("in-memory store"))
    }

    fn connect(lobby: &mut Lobby, pseudo: &str) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(32);
        lobby
            .register(pseudo, "127.0.0.1".to_string(), 40_000, tx)
            .expect("register");
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn code_a() -> Vec<Color> {
        vec![Red, Green, Blue, Yellow]
    }

    fn code_b() -> Vec<Color> {
        vec![Yellow, Yellow, Red, Green]
    }

    /// Pair two players into a Mastermind match and return their mailboxes
    /// and the match id.
    fn mastermind_pair(
        lobby: &mut Lobby,
    ) -> (mpsc::Receiver<ServerMessage>, mpsc::Receiver<ServerMessage>, i64) {
        let mut rx_a = connect(lobby, "a");
        let mut rx_b = connect(lobby, "b");
        lobby.join_mastermind("a", code_a()).unwrap();
        lobby.join_mastermind("b", code_b()).unwrap();

        let match_id = match drain(&mut rx_a).as_slice() {
            [ServerMessage::MastermindStart { match_id, opponent }] => {
                assert_eq!(opponent, "b");
                *match_id
            }
            other => panic!("expected MASTERMIND_START, got {other:?}"),
        };
        drain(&mut rx_b);
        (rx_a, rx_b, match_id)
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_pseudo() {
        let mut lobby = lobby();
        let _rx = connect(&mut lobby, "alice");

        let (tx, _rx2) = mpsc::channel(32);
        let err = lobby
            .register("alice", "127.0.0.1".to_string(), 40_001, tx)
            .unwrap_err();
        assert!(matches!(err, ConnectError::PseudoTaken));
        assert_eq!(err.to_string(), "Pseudo déjà pris.");
        assert_eq!(lobby.client_count(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_pseudo() {
        let mut lobby = lobby();
        let (tx, _rx) = mpsc::channel(32);
        let err = lobby
            .register("", "127.0.0.1".to_string(), 40_000, tx)
            .unwrap_err();
        assert!(matches!(err, ConnectError::InvalidPseudo));
    }

    #[tokio::test]
    async fn test_morpion_pairing_in_join_order() {
        let mut lobby = lobby();
        let mut rx_a = connect(&mut lobby, "a");
        let mut rx_b = connect(&mut lobby, "b");
        let mut rx_c = connect(&mut lobby, "c");

        lobby.join_morpion("a").unwrap();
        assert!(drain(&mut rx_a).is_empty());

        lobby.join_morpion("b").unwrap();
        lobby.join_morpion("c").unwrap();

        match drain(&mut rx_a).as_slice() {
            [ServerMessage::Start { opponent, symbol, .. }] => {
                assert_eq!(opponent, "b");
                assert_eq!(*symbol, Symbol::X);
            }
            other => panic!("expected START for a, got {other:?}"),
        }
        match drain(&mut rx_b).as_slice() {
            [ServerMessage::Start { opponent, symbol, .. }] => {
                assert_eq!(opponent, "a");
                assert_eq!(*symbol, Symbol::O);
            }
            other => panic!("expected START for b, got {other:?}"),
        }
        // c is third: still waiting.
        assert!(drain(&mut rx_c).is_empty());
        assert_eq!(lobby.morpion_queue.len(), 1);
    }

    #[tokio::test]
    async fn test_join_twice_is_dropped() {
        let mut lobby = lobby();
        let _rx = connect(&mut lobby, "a");
        lobby.join_morpion("a").unwrap();
        lobby.join_morpion("a").unwrap();
        assert_eq!(lobby.morpion_queue.len(), 1);
    }

    #[tokio::test]
    async fn test_join_while_in_match_is_dropped() {
        let mut lobby = lobby();
        let _rx_a = connect(&mut lobby, "a");
        let _rx_b = connect(&mut lobby, "b");
        lobby.join_morpion("a").unwrap();
        lobby.join_morpion("b").unwrap();
        assert_eq!(lobby.match_count(), 1);

        lobby.join_morpion("a").unwrap();
        assert_eq!(lobby.morpion_queue.len(), 0);
    }

    #[tokio::test]
    async fn test_leave_then_later_join_pairs_remaining() {
        let mut lobby = lobby();
        let mut rx_a = connect(&mut lobby, "a");
        let mut rx_b = connect(&mut lobby, "b");
        let mut rx_c = connect(&mut lobby, "c");

        lobby.join_morpion("a").unwrap();
        lobby.leave_morpion("a");
        assert_eq!(drain(&mut rx_a), vec![ServerMessage::LeftQueue]);

        lobby.join_morpion("b").unwrap();
        assert!(drain(&mut rx_b).is_empty());

        lobby.join_morpion("c").unwrap();
        assert!(matches!(
            drain(&mut rx_b).as_slice(),
            [ServerMessage::Start { .. }]
        ));
        assert!(matches!(
            drain(&mut rx_c).as_slice(),
            [ServerMessage::Start { .. }]
        ));
    }

    #[tokio::test]
    async fn test_leave_when_not_queued_sends_nothing() {
        let mut lobby = lobby();
        let mut rx_a = connect(&mut lobby, "a");
        lobby.leave_morpion("a");
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn test_morpion_happy_path() {
        let mut lobby = lobby();
        let mut rx_a = connect(&mut lobby, "a");
        let mut rx_b = connect(&mut lobby, "b");
        lobby.join_morpion("a").unwrap();
        lobby.join_morpion("b").unwrap();

        let match_id = match drain(&mut rx_a).as_slice() {
            [ServerMessage::Start { match_id, .. }] => *match_id,
            other => panic!("expected START, got {other:?}"),
        };
        drain(&mut rx_b);

        lobby.morpion_move("a", match_id, 0).unwrap();
        lobby.morpion_move("b", match_id, 1).unwrap();
        lobby.morpion_move("a", match_id, 4).unwrap();
        lobby.morpion_move("b", match_id, 2).unwrap();
        lobby.morpion_move("a", match_id, 8).unwrap();

        let to_b = drain(&mut rx_b);
        assert_eq!(
            to_b,
            vec![
                ServerMessage::Move { position: 0, symbol: Symbol::X },
                ServerMessage::Move { position: 4, symbol: Symbol::X },
                ServerMessage::Move { position: 8, symbol: Symbol::X },
                ServerMessage::End { result: "a".to_string() },
            ]
        );
        let to_a = drain(&mut rx_a);
        assert_eq!(
            to_a,
            vec![
                ServerMessage::Move { position: 1, symbol: Symbol::O },
                ServerMessage::Move { position: 2, symbol: Symbol::O },
                ServerMessage::End { result: "a".to_string() },
            ]
        );
        assert_eq!(lobby.match_count(), 0);
    }

    #[tokio::test]
    async fn test_morpion_draw() {
        let mut lobby = lobby();
        let mut rx_a = connect(&mut lobby, "a");
        let mut rx_b = connect(&mut lobby, "b");
        lobby.join_morpion("a").unwrap();
        lobby.join_morpion("b").unwrap();
        let match_id = match drain(&mut rx_a).as_slice() {
            [ServerMessage::Start { match_id, .. }] => *match_id,
            other => panic!("expected START, got {other:?}"),
        };
        drain(&mut rx_b);

        for (player, position) in [
            ("a", 0),
            ("b", 1),
            ("a", 2),
            ("b", 4),
            ("a", 3),
            ("b", 5),
            ("a", 7),
            ("b", 6),
            ("a", 8),
        ] {
            lobby.morpion_move(player, match_id, position).unwrap();
        }

        let last_to_a = drain(&mut rx_a).pop();
        assert_eq!(
            last_to_a,
            Some(ServerMessage::End { result: "draw".to_string() })
        );
    }

    #[tokio::test]
    async fn test_morpion_out_of_turn_dropped() {
        let mut lobby = lobby();
        let mut rx_a = connect(&mut lobby, "a");
        let mut rx_b = connect(&mut lobby, "b");
        lobby.join_morpion("a").unwrap();
        lobby.join_morpion("b").unwrap();
        let match_id = match drain(&mut rx_a).as_slice() {
            [ServerMessage::Start { match_id, .. }] => *match_id,
            other => panic!("expected START, got {other:?}"),
        };
        drain(&mut rx_b);

        // O cannot open, and X cannot move twice in a row.
        lobby.morpion_move("b", match_id, 0).unwrap();
        assert!(drain(&mut rx_a).is_empty());
        lobby.morpion_move("a", match_id, 0).unwrap();
        lobby.morpion_move("a", match_id, 1).unwrap();
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[tokio::test]
    async fn test_morpion_occupied_cell_dropped() {
        let mut lobby = lobby();
        let mut rx_a = connect(&mut lobby, "a");
        let mut rx_b = connect(&mut lobby, "b");
        lobby.join_morpion("a").unwrap();
        lobby.join_morpion("b").unwrap();
        let match_id = match drain(&mut rx_a).as_slice() {
            [ServerMessage::Start { match_id, .. }] => *match_id,
            other => panic!("expected START, got {other:?}"),
        };
        drain(&mut rx_b);

        lobby.morpion_move("a", match_id, 0).unwrap();
        lobby.morpion_move("b", match_id, 0).unwrap();
        assert!(drain(&mut rx_a).is_empty());

        // b's turn was not consumed by the rejected move.
        lobby.morpion_move("b", match_id, 1).unwrap();
        assert_eq!(drain(&mut rx_a).len(), 1);
    }

    #[tokio::test]
    async fn test_mastermind_pairing_consumes_codes() {
        let mut lobby = lobby();
        let (_rx_a, _rx_b, _match_id) = mastermind_pair(&mut lobby);
        assert!(lobby.stashed_codes.is_empty());
        assert_eq!(lobby.mastermind_queue.len(), 0);
        assert_eq!(lobby.match_count(), 1);
    }

    #[tokio::test]
    async fn test_mastermind_invalid_code_not_queued() {
        let mut lobby = lobby();
        let _rx = connect(&mut lobby, "a");
        lobby.join_mastermind("a", vec![Red, Green]).unwrap();
        assert_eq!(lobby.mastermind_queue.len(), 0);
        assert!(lobby.stashed_codes.is_empty());
    }

    #[tokio::test]
    async fn test_mastermind_feedback_flows_both_ways() {
        let mut lobby = lobby();
        let (mut rx_a, mut rx_b, match_id) = mastermind_pair(&mut lobby);

        // a guesses against b's code [Y, Y, R, G].
        lobby
            .mastermind_guess("a", match_id, vec![Green, Red, Red, Yellow])
            .unwrap();

        match drain(&mut rx_a).as_slice() {
            [ServerMessage::MastermindFeedback { black_pins, white_pins, guess_number }] => {
                assert_eq!((*black_pins, *white_pins, *guess_number), (1, 2, 1));
            }
            other => panic!("expected feedback, got {other:?}"),
        }
        match drain(&mut rx_b).as_slice() {
            [ServerMessage::MastermindOpponentGuess { guess, black_pins, white_pins, .. }] => {
                assert_eq!(guess, &vec![Green, Red, Red, Yellow]);
                assert_eq!((*black_pins, *white_pins), (1, 2));
            }
            other => panic!("expected opponent guess, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mastermind_win_reveals_codes_and_rates() {
        let mut lobby = lobby();
        let (mut rx_a, mut rx_b, match_id) = mastermind_pair(&mut lobby);

        lobby.mastermind_guess("a", match_id, code_b()).unwrap();

        let to_a = drain(&mut rx_a);
        assert_eq!(to_a.len(), 3);
        assert!(matches!(
            to_a[0],
            ServerMessage::MastermindFeedback { black_pins: 4, white_pins: 0, guess_number: 1 }
        ));
        match &to_a[1] {
            ServerMessage::MastermindEnd { result, player1_code, player2_code } => {
                assert_eq!(result, "a");
                assert_eq!(player1_code, &code_a());
                assert_eq!(player2_code, &code_b());
            }
            other => panic!("expected MASTERMIND_END, got {other:?}"),
        }
        assert_eq!(
            to_a[2],
            ServerMessage::RatingUpdate { old_rating: 1200, new_rating: 1220 }
        );

        let to_b = drain(&mut rx_b);
        assert_eq!(to_b.len(), 3);
        assert_eq!(
            to_b[2],
            ServerMessage::RatingUpdate { old_rating: 1200, new_rating: 1180 }
        );

        assert_eq!(lobby.match_count(), 0);

        // games_played moved for both; deltas cancel (invariant).
        let a = lobby.ranking("a").unwrap();
        let b = lobby.ranking("b").unwrap();
        assert_eq!(a.games_played, 1);
        assert_eq!(b.games_played, 1);
        assert!(((a.elo_rating - 1200) + (b.elo_rating - 1200)).abs() <= 1);
    }

    #[tokio::test]
    async fn test_mastermind_first_serialized_solve_wins() {
        let mut lobby = lobby();
        let (_rx_a, mut rx_b, match_id) = mastermind_pair(&mut lobby);

        // Both sides solve "simultaneously"; a's guess is serialized first,
        // finalizes the match and evicts it.
        lobby.mastermind_guess("a", match_id, code_b()).unwrap();
        drain(&mut rx_b);

        // b's solving guess finds the match gone and is silently dropped.
        lobby.mastermind_guess("b", match_id, code_a()).unwrap();
        assert!(drain(&mut rx_b).is_empty());

        // The result and rankings stand as a's win; b's late solve neither
        // journals a turn nor triggers a second rating update.
        let a = lobby.ranking("a").unwrap();
        let b = lobby.ranking("b").unwrap();
        assert_eq!((a.games_played, a.wins), (1, 1));
        assert_eq!((b.games_played, b.losses), (1, 1));
        assert_eq!(b.elo_rating, 1180);
    }

    #[tokio::test]
    async fn test_mastermind_exhaustion_draws() {
        let mut lobby = lobby();
        let (mut rx_a, mut rx_b, match_id) = mastermind_pair(&mut lobby);

        let wrong_for_b = vec![Blue, Blue, Blue, Blue]; // vs [Y,Y,R,G]
        let wrong_for_a = vec![Purple, Purple, Purple, Purple]; // vs [R,G,B,Y]
        for _ in 0..MAX_ATTEMPTS {
            lobby
                .mastermind_guess("a", match_id, wrong_for_b.clone())
                .unwrap();
            lobby
                .mastermind_guess("b", match_id, wrong_for_a.clone())
                .unwrap();
        }

        let last_to_a = drain(&mut rx_a)
            .into_iter()
            .filter(|m| matches!(m, ServerMessage::MastermindEnd { .. }))
            .next_back();
        match last_to_a {
            Some(ServerMessage::MastermindEnd { result, .. }) => assert_eq!(result, "draw"),
            other => panic!("expected draw end, got {other:?}"),
        }
        drain(&mut rx_b);

        let a = lobby.ranking("a").unwrap();
        assert_eq!((a.games_played, a.draws), (1, 1));
    }

    #[tokio::test]
    async fn test_mastermind_eleventh_guess_dropped() {
        let mut lobby = lobby();
        let (mut rx_a, _rx_b, match_id) = mastermind_pair(&mut lobby);

        let wrong = vec![Blue, Blue, Blue, Blue];
        for _ in 0..MAX_ATTEMPTS {
            lobby.mastermind_guess("a", match_id, wrong.clone()).unwrap();
        }
        drain(&mut rx_a);

        lobby.mastermind_guess("a", match_id, wrong.clone()).unwrap();
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn test_mastermind_solve_after_burned_attempts_still_wins() {
        let mut lobby = lobby();
        let (mut rx_a, _rx_b, match_id) = mastermind_pair(&mut lobby);

        // Wrong guesses never finalize; a later solve does.
        lobby
            .mastermind_guess("a", match_id, vec![Blue, Blue, Blue, Blue])
            .unwrap();
        assert_eq!(lobby.match_count(), 1);
        lobby.mastermind_guess("a", match_id, code_b()).unwrap();

        let end = drain(&mut rx_a)
            .into_iter()
            .find(|m| matches!(m, ServerMessage::MastermindEnd { .. }));
        match end {
            Some(ServerMessage::MastermindEnd { result, .. }) => assert_eq!(result, "a"),
            other => panic!("expected a to win, got {other:?}"),
        }
        assert_eq!(lobby.match_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_interrupts_match_without_rating() {
        let mut lobby = lobby();
        let (_rx_a, mut rx_b, _match_id) = mastermind_pair(&mut lobby);

        lobby.disconnect("a");

        match drain(&mut rx_b).as_slice() {
            [ServerMessage::MatchInterrupted { message }] => {
                assert!(message.contains("a"));
            }
            other => panic!("expected MATCH_INTERRUPTED, got {other:?}"),
        }
        assert_eq!(lobby.match_count(), 0);
        assert_eq!(lobby.client_count(), 1);

        // Rankings untouched by the interruption.
        let b = lobby.ranking("b").unwrap();
        assert_eq!(b.games_played, 0);
    }

    #[tokio::test]
    async fn test_disconnect_purges_queue_and_code() {
        let mut lobby = lobby();
        let _rx = connect(&mut lobby, "a");
        lobby.join_mastermind("a", code_a()).unwrap();

        lobby.disconnect("a");
        assert_eq!(lobby.mastermind_queue.len(), 0);
        assert!(lobby.stashed_codes.is_empty());
        assert_eq!(lobby.client_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_pseudo_is_reclaimable() {
        let mut lobby = lobby();
        let _rx = connect(&mut lobby, "a");
        lobby.disconnect("a");

        let (tx, _rx2) = mpsc::channel(32);
        assert!(lobby.register("a", "127.0.0.1".to_string(), 40_002, tx).is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_everything() {
        let mut lobby = lobby();
        let (mut rx_a, mut rx_b, _match_id) = mastermind_pair(&mut lobby);

        lobby.shutdown_all();
        assert_eq!(lobby.match_count(), 0);
        assert!(matches!(
            drain(&mut rx_a).as_slice(),
            [ServerMessage::MatchInterrupted { .. }]
        ));
        assert!(matches!(
            drain(&mut rx_b).as_slice(),
            [ServerMessage::MatchInterrupted { .. }]
        ));
    }

    #[tokio::test]
    async fn test_move_for_unknown_match_dropped() {
        let mut lobby = lobby();
        let mut rx = connect(&mut lobby, "a");
        lobby.morpion_move("a", 999, 0).unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_connect_status_serializes() {
        // Sanity-check the reply the session sends on registration.
        let ok = ServerMessage::Connect {
            status: ConnectStatus::Ok,
            message: None,
        };
        assert_eq!(
            serde_json::to_string(&ok).unwrap(),
            r#"{"action":"CONNECT","status":"OK"}"#
        );
    }
}
