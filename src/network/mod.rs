//! Networking module
//!
//! TCP listener, per-connection sessions, the wire protocol and codec,
//! and the lobby holding all shared state under the core lock.

pub mod codec;
pub mod lobby;
pub mod protocol;
pub mod server;
pub mod session;

pub use lobby::Lobby;
pub use protocol::{ClientMessage, ServerMessage};
pub use server::{GameServer, ServerConfig};
