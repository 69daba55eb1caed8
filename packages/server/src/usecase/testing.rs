//! Fixtures shared by the use-case tests.
//!
//! Real registry, pusher, and typing tracker; each client is an in-process
//! channel standing in for a socket.

use std::sync::Arc;

use kaiwa_shared::time::FixedClock;
use tokio::sync::mpsc;

use crate::{
    domain::{ChatStore, ConnectionId, DisplayName, Identity, RoomId, UserId},
    infrastructure::{
        message_pusher::WebSocketMessagePusher,
        registry::InMemoryConnectionRegistry,
        store::InMemoryChatStore,
        typing_tracker::{DEFAULT_TYPING_EXPIRY, TypingExpired, TypingTracker},
    },
};

use super::{
    message_pipeline::{ChatHistory, DEFAULT_HISTORY_LIMIT, MessagePipeline},
    room_broker::RoomBroker,
};

pub(crate) const START_MILLIS: i64 = 1_700_000_000_000;

pub(crate) fn room(id: &str) -> RoomId {
    RoomId::try_from(id).unwrap()
}

pub(crate) fn identity(name: &str) -> Identity {
    Identity::new(
        UserId::try_from(format!("u-{}", name)).unwrap(),
        DisplayName::try_from(name).unwrap(),
        None,
    )
}

pub(crate) struct TestClient {
    pub id: ConnectionId,
    pub rx: mpsc::UnboundedReceiver<String>,
}

impl TestClient {
    /// Every frame received so far, parsed.
    pub fn drain(&mut self) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    pub fn event_names(&mut self) -> Vec<String> {
        self.drain()
            .iter()
            .map(|f| f["event"].as_str().unwrap().to_string())
            .collect()
    }
}

pub(crate) struct Harness {
    pub broker: Arc<RoomBroker>,
    pub pipeline: Arc<MessagePipeline>,
    pub clock: Arc<FixedClock>,
    expired_rx: Option<mpsc::UnboundedReceiver<TypingExpired>>,
}

impl Harness {
    pub fn in_memory() -> (Self, Arc<InMemoryChatStore>) {
        let store = Arc::new(InMemoryChatStore::new());
        (Self::with_store(store.clone()), store)
    }

    pub fn with_store(store: Arc<dyn ChatStore>) -> Self {
        let clock = Arc::new(FixedClock::new(START_MILLIS));
        let (typing, expired_rx) = TypingTracker::new(DEFAULT_TYPING_EXPIRY);
        let broker = Arc::new(RoomBroker::new(
            Arc::new(InMemoryConnectionRegistry::default()),
            Arc::new(WebSocketMessagePusher::new()),
            Arc::new(typing),
            Arc::new(ChatHistory::new(store.clone(), DEFAULT_HISTORY_LIMIT)),
            clock.clone(),
        ));
        let pipeline = Arc::new(MessagePipeline::new(broker.clone(), store, clock.clone()));
        Self {
            broker,
            pipeline,
            clock,
            expired_rx: Some(expired_rx),
        }
    }

    pub fn take_expired_rx(&mut self) -> mpsc::UnboundedReceiver<TypingExpired> {
        self.expired_rx.take().unwrap()
    }

    /// A connected socket that has not claimed an identity.
    pub async fn anonymous(&self) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::generate();
        self.broker.connect(id.clone(), tx).await;
        let mut client = TestClient { id, rx };
        client.drain();
        client
    }

    pub async fn identified(&self, name: &str) -> TestClient {
        let mut client = self.anonymous().await;
        self.broker.admit(&client.id, identity(name)).await.unwrap();
        client.drain();
        client
    }

    pub async fn joined(&self, name: &str, room_id: &str) -> TestClient {
        let mut client = self.identified(name).await;
        self.broker.join(&client.id, room(room_id)).await.unwrap();
        client.drain();
        client
    }
}
