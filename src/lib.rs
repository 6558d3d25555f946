//! # Salon Game Server
//!
//! Matchmaking and game-session server for two-player Morpion and
//! Mastermind duels over persistent TCP connections.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SALON SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - Pure rule engines                         │
//! │  ├── morpion.rs  - 3x3 board, win/draw detection             │
//! │  ├── mastermind.rs - Code feedback scoring                   │
//! │  └── elo.rs      - Rating expectation and K-factor updates   │
//! │                                                              │
//! │  store/          - Durable records (SQLite)                  │
//! │  ├── records.rs  - Persisted record types                    │
//! │  └── mod.rs      - Players, matches, turns, rankings         │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - TCP listener and accept loop              │
//! │  ├── session.rs  - Per-connection read loop and dispatch     │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── codec.rs    - Newline-delimited JSON framing            │
//! │  └── lobby.rs    - Queues, live matches, arbitration         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency model
//!
//! One task per accepted connection reads frames and dispatches into the
//! [`network::lobby::Lobby`], a single owned state struct behind one lock
//! that holds the live-client table, both matchmaking queues, the match
//! registry, and the persistence store. Outbound messages go through a
//! bounded per-session mailbox so no two tasks ever write the same socket.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod game;
pub mod network;
pub mod store;

// Re-export commonly used types
pub use game::mastermind::{Color, Feedback, CODE_LENGTH, MAX_ATTEMPTS};
pub use game::morpion::{Board, Outcome, Symbol};
pub use network::server::{GameServer, ServerConfig};
pub use store::Store;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "localhost:12345";

/// Default SQLite database file
pub const DEFAULT_DB_PATH: &str = "matchmaking.db";
