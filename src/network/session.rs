//! Client Session
//!
//! One task per accepted connection. The session reads frames, walks the
//! `Unauthenticated -> Authenticated(pseudo)` state machine, and dispatches
//! every action into the lobby under the core lock. A writer task owns the
//! socket's write half and drains the session mailbox, so pushes from other
//! sessions never race on the stream.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::network::codec;
use crate::network::lobby::{ConnectError, Lobby};
use crate::network::protocol::{ClientMessage, ConnectStatus, ServerMessage};
use crate::network::server::ServerConfig;

/// Drive one connection until the peer disconnects, a codec error ends the
/// session, or the server shuts down.
pub async fn run_session(
    stream: TcpStream,
    addr: SocketAddr,
    lobby: Arc<Mutex<Lobby>>,
    config: Arc<ServerConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(config.mailbox_capacity);

    // Writer task: sole owner of the write half.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = codec::write_frame(&mut write_half, &msg).await {
                debug!("Write to {addr} failed: {e}");
                break;
            }
        }
    });

    let mut authenticated: Option<String> = None;

    loop {
        let frame = tokio::select! {
            frame = codec::read_frame(&mut reader, config.max_frame_bytes) => frame,
            _ = shutdown.recv() => {
                debug!("Session {addr} closing on server shutdown");
                break;
            }
        };

        let line = match frame {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Client {addr} disconnected");
                break;
            }
            Err(e) => {
                warn!("Session {addr} terminated: {e}");
                break;
            }
        };

        let msg = match codec::decode(&line) {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                debug!("Unknown or unusable message from {addr}; dropped");
                continue;
            }
            Err(e) => {
                warn!("Session {addr} terminated: {e}");
                break;
            }
        };

        match &authenticated {
            None => match msg {
                ClientMessage::Connect { pseudo, .. } => {
                    let result = {
                        let mut lobby = lobby.lock().await;
                        lobby.register(&pseudo, addr.ip().to_string(), addr.port(), tx.clone())
                    };
                    match result {
                        Ok(()) => {
                            info!("{pseudo} authenticated from {addr}");
                            let _ = tx
                                .send(ServerMessage::Connect {
                                    status: ConnectStatus::Ok,
                                    message: None,
                                })
                                .await;
                            authenticated = Some(pseudo);
                        }
                        Err(ConnectError::Store(e)) => {
                            error!("CONNECT for {pseudo} failed in store: {e}");
                            break;
                        }
                        Err(refusal) => {
                            debug!("CONNECT refused for {addr}: {refusal}");
                            let _ = tx
                                .send(ServerMessage::Connect {
                                    status: ConnectStatus::Error,
                                    message: Some(refusal.to_string()),
                                })
                                .await;
                        }
                    }
                }
                other => debug!("Message before CONNECT from {addr} dropped: {other:?}"),
            },
            Some(pseudo) => dispatch(&lobby, pseudo, msg, addr).await,
        }
    }

    if let Some(pseudo) = authenticated {
        lobby.lock().await.disconnect(&pseudo);
    }
    writer.abort();
    debug!("Session {addr} cleaned up");
}

/// Dispatch one authenticated action into the lobby.
async fn dispatch(lobby: &Arc<Mutex<Lobby>>, pseudo: &str, msg: ClientMessage, addr: SocketAddr) {
    if matches!(msg, ClientMessage::Connect { .. }) {
        debug!("CONNECT from already-authenticated {pseudo}; dropped");
        return;
    }
    // A sender can only act on its own behalf.
    if let Some(claimed) = msg.pseudo() {
        if claimed != pseudo {
            debug!("{pseudo} sent a message claiming to be {claimed}; dropped");
            return;
        }
    }

    let mut lobby = lobby.lock().await;
    let result = match msg {
        ClientMessage::Join { .. } => lobby.join_morpion(pseudo),
        ClientMessage::Leave { .. } => {
            lobby.leave_morpion(pseudo);
            Ok(())
        }
        ClientMessage::JoinMastermind { code, .. } => lobby.join_mastermind(pseudo, code),
        ClientMessage::LeaveMastermind { .. } => {
            lobby.leave_mastermind(pseudo);
            Ok(())
        }
        ClientMessage::Move {
            match_id, position, ..
        } => lobby.morpion_move(pseudo, match_id, position),
        ClientMessage::MastermindGuess {
            match_id, guess, ..
        } => lobby.mastermind_guess(pseudo, match_id, guess),
        ClientMessage::GetPlayerRanking { .. } => lobby.ranking(pseudo).map(|ranking_data| {
            lobby.send_to(pseudo, ServerMessage::PlayerRanking { ranking_data });
        }),
        ClientMessage::GetPlayerRank { .. } => lobby.rank(pseudo).map(|rank| {
            lobby.send_to(pseudo, ServerMessage::PlayerRank { rank });
        }),
        ClientMessage::GetTopPlayers => lobby.top_players().map(|players| {
            lobby.send_to(pseudo, ServerMessage::TopPlayers { players });
        }),
        ClientMessage::GetPlayerHistory { .. } => lobby.history(pseudo).map(|history| {
            lobby.send_to(pseudo, ServerMessage::PlayerHistory { history });
        }),
        ClientMessage::Connect { .. } => Ok(()),
    };

    if let Err(e) = result {
        error!("Action from {pseudo} ({addr}) failed in store: {e}");
    }
}
