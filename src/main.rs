//! Duskfall Game Server
//!
//! Authoritative server binary: one process hosts many rooms, each running
//! one match behind its own serialized command queue.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use duskfall::network::auth::AuthConfig;
use duskfall::network::server::{GameServer, ServerConfig};
use duskfall::{DEFAULT_DISCUSSION_SECS, DEFAULT_VOTING_SECS, TICK_RATE, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (RUST_LOG overrides, default info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Duskfall Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);
    info!(
        "Phase timers: {}s discussion, {}s voting",
        DEFAULT_DISCUSSION_SECS, DEFAULT_VOTING_SECS
    );

    let mut config = ServerConfig::default();
    if let Ok(addr) = std::env::var("DUSKFALL_BIND_ADDR") {
        config.bind_addr = addr
            .parse()
            .with_context(|| format!("invalid DUSKFALL_BIND_ADDR: {}", addr))?;
    }

    let auth = AuthConfig::from_env();
    if auth.is_configured() {
        info!("JWT authentication enabled");
    }

    let server = GameServer::new(config, auth);
    server.run().await.context("server terminated with error")?;

    Ok(())
}
