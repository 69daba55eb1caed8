//! Timeout decorator for any `ChatStore`.
//!
//! The real-time path never waits on storage longer than the configured bound;
//! an elapsed call surfaces as `StoreError::Timeout` and takes the same
//! degraded path as any other store failure.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::domain::{
    ChatStore, Identity, Message, MessageId, NewMessage, ParticipantRecord, Reaction, RoomId,
    StoreError, Timestamp,
};

/// Default bound for a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct TimeoutChatStore {
    inner: Arc<dyn ChatStore>,
    timeout: Duration,
}

impl TimeoutChatStore {
    pub fn new(inner: Arc<dyn ChatStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl ChatStore for TimeoutChatStore {
    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        self.bounded("insert_message", self.inner.insert_message(message))
            .await
    }

    async fn upsert_reaction(&self, reaction: Reaction) -> Result<(), StoreError> {
        self.bounded("upsert_reaction", self.inner.upsert_reaction(reaction))
            .await
    }

    async fn find_message_room(
        &self,
        message_id: &MessageId,
    ) -> Result<Option<RoomId>, StoreError> {
        self.bounded("find_message_room", self.inner.find_message_room(message_id))
            .await
    }

    async fn query_recent_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        self.bounded(
            "query_recent_messages",
            self.inner.query_recent_messages(room_id, limit),
        )
        .await
    }

    async fn query_participants(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<ParticipantRecord>, StoreError> {
        self.bounded("query_participants", self.inner.query_participants(room_id))
            .await
    }

    async fn upsert_participant_presence(
        &self,
        room_id: &RoomId,
        identity: &Identity,
        is_online: bool,
        seen_at: Timestamp,
    ) -> Result<(), StoreError> {
        self.bounded(
            "upsert_participant_presence",
            self.inner
                .upsert_participant_presence(room_id, identity, is_online, seen_at),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::MockChatStore, infrastructure::store::InMemoryChatStore,
    };

    /// Store whose every call hangs forever.
    struct StalledStore;

    #[async_trait]
    impl ChatStore for StalledStore {
        async fn insert_message(&self, _message: NewMessage) -> Result<Message, StoreError> {
            std::future::pending().await
        }

        async fn upsert_reaction(&self, _reaction: Reaction) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn find_message_room(
            &self,
            _message_id: &MessageId,
        ) -> Result<Option<RoomId>, StoreError> {
            std::future::pending().await
        }

        async fn query_recent_messages(
            &self,
            _room_id: &RoomId,
            _limit: usize,
        ) -> Result<Vec<Message>, StoreError> {
            std::future::pending().await
        }

        async fn query_participants(
            &self,
            _room_id: &RoomId,
        ) -> Result<Vec<ParticipantRecord>, StoreError> {
            std::future::pending().await
        }

        async fn upsert_participant_presence(
            &self,
            _room_id: &RoomId,
            _identity: &Identity,
            _is_online: bool,
            _seen_at: Timestamp,
        ) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_call_times_out() {
        // テスト項目: 応答しないストア呼び出しは上限時間で Timeout になる
        // given (前提条件):
        let store = TimeoutChatStore::new(Arc::new(StalledStore), Duration::from_secs(3));
        let room_id = RoomId::try_from("r1").unwrap();

        // when (操作):
        let started = tokio::time::Instant::now();
        let result = store.query_recent_messages(&room_id, 100).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(StoreError::Timeout {
                operation: "query_recent_messages",
                timeout_ms: 3_000,
            })
        );
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        // テスト項目: 上限時間内に終わる呼び出しは結果がそのまま返る
        // given (前提条件):
        let inner = Arc::new(InMemoryChatStore::new());
        let store = TimeoutChatStore::new(inner, DEFAULT_STORE_TIMEOUT);
        let room_id = RoomId::try_from("r1").unwrap();

        // when (操作):
        let result = store.query_participants(&room_id).await;

        // then (期待する結果):
        assert_eq!(result, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_inner_error_is_not_masked() {
        // テスト項目: 内側のストアのエラーはそのまま伝播する
        // given (前提条件):
        let mut inner = MockChatStore::new();
        inner
            .expect_query_participants()
            .returning(|_| Err(StoreError::Unavailable("connection refused".to_string())));
        let store = TimeoutChatStore::new(Arc::new(inner), DEFAULT_STORE_TIMEOUT);

        // when (操作):
        let result = store
            .query_participants(&RoomId::try_from("r1").unwrap())
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(StoreError::Unavailable("connection refused".to_string()))
        );
    }
}
