//! Salon Game Server
//!
//! Matchmaking server for Morpion and Mastermind duels: binds the TCP
//! listener, serves sessions until Ctrl-C, then interrupts every live
//! match before exiting.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use salon::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    info!("Salon Server v{VERSION}");
    info!(
        "Binding {} (database: {})",
        config.bind_addr,
        config.db_path.display()
    );

    let server = GameServer::new(config).context("failed to start server")?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received; shutting down");
            let _ = shutdown.send(());
        }
    });

    server.run().await?;
    info!("Server stopped");
    Ok(())
}
