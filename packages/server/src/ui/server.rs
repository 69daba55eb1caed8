//! Server wiring and execution logic.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use kaiwa_shared::time::Clock;
use tokio::{net::TcpListener, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::{
    config::BrokerConfig,
    domain::ChatStore,
    infrastructure::{
        message_pusher::WebSocketMessagePusher,
        registry::InMemoryConnectionRegistry,
        store::TimeoutChatStore,
        typing_tracker::{TypingExpired, TypingTracker},
    },
    usecase::{AccessGate, ChatHistory, MessagePipeline, PresenceReconciler, RoomBroker},
};

use super::{
    handler::{
        get_room_connections, get_stats, health_check, post_system_message, websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Room broker server
///
/// Owns the wired use cases and the background tasks that run next to the
/// HTTP listener (typing expiry forwarding, presence sweep, stats logging).
///
/// # Example
///
/// ```ignore
/// let config = BrokerConfig::default();
/// let server = Server::new(&config, Arc::new(InMemoryChatStore::new()), Arc::new(SystemClock));
/// server.run(&config.host, config.port).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    reconciler: Arc<PresenceReconciler>,
    reconcile_interval: Duration,
    stats_interval: Duration,
    expired_rx: mpsc::UnboundedReceiver<TypingExpired>,
}

impl Server {
    /// Wire every component from `config`.
    ///
    /// `store` is wrapped in a [`TimeoutChatStore`] so that no store call can
    /// stall a connection longer than `config.store_timeout`.
    pub fn new(config: &BrokerConfig, store: Arc<dyn ChatStore>, clock: Arc<dyn Clock>) -> Self {
        let store: Arc<dyn ChatStore> =
            Arc::new(TimeoutChatStore::new(store, config.store_timeout));

        let registry = Arc::new(InMemoryConnectionRegistry::new(config.session_policy));
        let message_pusher = Arc::new(WebSocketMessagePusher::new());
        let (typing, expired_rx) = TypingTracker::new(config.typing_expiry);
        let history = Arc::new(ChatHistory::new(store.clone(), config.history_limit));

        let broker = Arc::new(RoomBroker::new(
            registry,
            message_pusher,
            Arc::new(typing),
            history,
            clock.clone(),
        ));
        let pipeline = Arc::new(MessagePipeline::new(broker.clone(), store, clock.clone()));
        let reconciler = Arc::new(PresenceReconciler::new(
            broker.clone(),
            clock,
            config.reconcile_grace,
        ));

        let state = Arc::new(AppState {
            access_gate: AccessGate::new(config.origin_policy.clone()),
            broker,
            pipeline,
            shutdown: CancellationToken::new(),
        });

        Self {
            state,
            reconciler,
            reconcile_interval: config.reconcile_interval,
            stats_interval: config.stats_interval,
            expired_rx,
        }
    }

    /// Token that stops the server (and closes open sockets) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/stats", get(get_stats))
            .route("/api/rooms/{room_id}/connections", get(get_room_connections))
            .route(
                "/api/rooms/{room_id}/system-messages",
                post(post_system_message),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on an already bound listener until the shutdown token fires.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let app = self.router();
        let shutdown = self.state.shutdown.clone();

        let forwarder = tokio::spawn({
            let broker = self.state.broker.clone();
            let shutdown = shutdown.clone();
            let expired_rx = self.expired_rx;
            async move { broker.forward_typing_expirations(expired_rx, shutdown).await }
        });
        let reconciler = tokio::spawn({
            let reconciler = self.reconciler.clone();
            let shutdown = shutdown.clone();
            let interval = self.reconcile_interval;
            async move { reconciler.run(interval, shutdown).await }
        });
        let stats_reporter = tokio::spawn({
            let broker = self.state.broker.clone();
            let shutdown = shutdown.clone();
            let interval = self.stats_interval;
            async move { broker.report_stats(interval, shutdown).await }
        });

        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await;

        // The listener may also stop on its own (I/O error); stop the background tasks either way.
        shutdown.cancel();
        let _ = forwarder.await;
        let _ = reconciler.await;
        let _ = stats_reporter.await;

        result?;
        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Bind `host:port` and serve until Ctrl+C / SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: &str, port: u16) -> Result<(), ServerError> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Room broker listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        let shutdown = self.shutdown_token();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });

        self.serve(listener).await
    }
}
