//! Kaiwa room broker server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kaiwa-server
//! cargo run --bin kaiwa-server -- --host 0.0.0.0 --port 3000 --allowed-origins https://app.example.com
//! KAIWA_GATE_MODE=permissive cargo run --bin kaiwa-server
//! ```

use std::sync::Arc;

use clap::Parser;
use kaiwa_server::{
    config::{BrokerConfig, ServerArgs},
    domain::GateMode,
    infrastructure::store::InMemoryChatStore,
    ui::Server,
};
use kaiwa_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    let args = ServerArgs::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = match BrokerConfig::try_from(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.origin_policy.rules().is_empty() && config.origin_policy.mode() == GateMode::Strict {
        tracing::warn!("No allowed origins configured; browser connections will be rejected");
    }
    tracing::info!(
        "Typing expiry {:?}, store timeout {:?}, history limit {}, multiple sessions {}",
        config.typing_expiry,
        config.store_timeout,
        config.history_limit,
        config.session_policy.allow_multiple_sessions
    );

    // Initialize dependencies in order:
    // 1. Store (in-memory)
    // 2. Clock
    // 3. Server (registry, pusher, use cases)
    let store = Arc::new(InMemoryChatStore::new());
    let clock = Arc::new(SystemClock);
    let server = Server::new(&config, store, clock);

    if let Err(e) = server.run(&config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
