//! TCP Game Server
//!
//! Binds the configured address, accepts connections, and spawns one
//! session task per client. Shutdown closes the listener and interrupts
//! every in-progress match so nothing is finalized as a win.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};

use crate::network::codec::DEFAULT_MAX_FRAME_BYTES;
use crate::network::lobby::Lobby;
use crate::network::session;
use crate::store::{Store, StoreError};
use crate::{DEFAULT_BIND_ADDR, DEFAULT_DB_PATH};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address, host:port.
    pub bind_addr: String,
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Per-frame byte cap; larger frames terminate the session.
    pub max_frame_bytes: usize,
    /// Outbound mailbox capacity per session.
    pub mailbox_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            mailbox_capacity: 64,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("SALON_BIND_ADDR").unwrap_or(defaults.bind_addr),
            db_path: std::env::var("SALON_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            max_frame_bytes: std::env::var("SALON_MAX_FRAME_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_frame_bytes),
            mailbox_capacity: std::env::var("SALON_MAILBOX_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.mailbox_capacity),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind the listen address.
    #[error("Failed to bind: {0}")]
    Bind(#[from] std::io::Error),

    /// The store could not be opened.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// The game server.
pub struct GameServer {
    config: Arc<ServerConfig>,
    lobby: Arc<Mutex<Lobby>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server, opening the store at the configured path.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let store = Store::open(&config.db_path)?;
        Ok(Self::with_store(config, store))
    }

    /// Create a server over an already-opened store.
    pub fn with_store(config: ServerConfig, store: Store) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config: Arc::new(config),
            lobby: Arc::new(Mutex::new(Lobby::new(store))),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr.as_str()).await?;
        info!("Server listening on {}", listener.local_addr()?);
        self.serve(listener).await;
        Ok(())
    }

    /// Serve connections from an already-bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            info!("New connection from {addr}");
                            let lobby = self.lobby.clone();
                            let config = self.config.clone();
                            let shutdown = self.shutdown_tx.subscribe();
                            tokio::spawn(async move {
                                session::run_session(stream, addr, lobby, config, shutdown).await;
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {e}");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // In-progress matches must never count as wins.
        self.lobby.lock().await.shutdown_all();
    }

    /// Ask the server to stop serving.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// A handle other tasks can use to trigger shutdown.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Number of live, authenticated sessions.
    pub async fn client_count(&self) -> usize {
        self.lobby.lock().await.client_count()
    }

    /// Number of live matches.
    pub async fn match_count(&self) -> usize {
        self.lobby.lock().await.match_count()
    }

    /// Players waiting in the two queues: (morpion, mastermind).
    pub async fn queue_sizes(&self) -> (usize, usize) {
        let lobby = self.lobby.lock().await;
        (lobby.morpion_queue_len(), lobby.mastermind_queue_len())
    }
}
