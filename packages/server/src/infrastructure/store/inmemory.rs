//! InMemory ChatStore 実装
//!
//! ドメイン層が定義する ChatStore trait の具体的な実装。
//! メッセージ・リアクション・参加者レコードをプロセス内に保持します。
//!
//! `set_available(false)` でストア障害を再現できます（縮退動作の確認用）。

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    ChatStore, Identity, Message, MessageId, NewMessage, ParticipantRecord, Reaction, RoomId,
    StoreError, Timestamp, UserId,
};

#[derive(Default)]
struct StoreState {
    /// Insertion order
    messages: Vec<Message>,
    reactions: HashSet<Reaction>,
    participants: HashMap<(RoomId, UserId), ParticipantRecord>,
}

/// インメモリ ChatStore 実装
pub struct InMemoryChatStore {
    state: Mutex<StoreState>,
    available: AtomicBool,
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        tracing::info!("InMemoryChatStore availability set to {}", available);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Reactions stored for a message.
    pub async fn reactions_for(&self, message_id: &MessageId) -> Vec<Reaction> {
        let state = self.state.lock().await;
        state
            .reactions
            .iter()
            .filter(|r| &r.message_id == message_id)
            .cloned()
            .collect()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store is offline".to_string()))
        }
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        self.ensure_available()?;
        let id = MessageId::new(Uuid::new_v4().to_string())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let message = message.into_message(id);

        let mut state = self.state.lock().await;
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn upsert_reaction(&self, reaction: Reaction) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut state = self.state.lock().await;
        if !state.messages.iter().any(|m| m.id == reaction.message_id) {
            return Err(StoreError::MessageNotFound(reaction.message_id.into_string()));
        }
        state.reactions.insert(reaction);
        Ok(())
    }

    async fn find_message_room(
        &self,
        message_id: &MessageId,
    ) -> Result<Option<RoomId>, StoreError> {
        self.ensure_available()?;
        let state = self.state.lock().await;
        Ok(state
            .messages
            .iter()
            .find(|m| &m.id == message_id)
            .map(|m| m.room_id.clone()))
    }

    async fn query_recent_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        self.ensure_available()?;
        let state = self.state.lock().await;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| &m.room_id == room_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }

    async fn query_participants(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<ParticipantRecord>, StoreError> {
        self.ensure_available()?;
        let state = self.state.lock().await;
        let mut participants: Vec<ParticipantRecord> = state
            .participants
            .values()
            .filter(|p| &p.room_id == room_id && p.is_online)
            .cloned()
            .collect();
        participants.sort_by(|a, b| a.identity.display_name.cmp(&b.identity.display_name));
        Ok(participants)
    }

    async fn upsert_participant_presence(
        &self,
        room_id: &RoomId,
        identity: &Identity,
        is_online: bool,
        seen_at: Timestamp,
    ) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut state = self.state.lock().await;
        state.participants.insert(
            (room_id.clone(), identity.user_id.clone()),
            ParticipantRecord {
                room_id: room_id.clone(),
                identity: identity.clone(),
                is_online,
                last_seen_at: seen_at,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DisplayName, MessageBody, MessageKind, ReactionKind};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - メッセージの保存と履歴取得（順序・件数上限・ルーム分離）
    // - リアクションの upsert（重複しない）
    // - 参加者のオンライン状態
    // - 障害注入スイッチ
    // ========================================

    fn identity(user: &str) -> Identity {
        Identity::new(
            UserId::try_from(format!("u-{}", user)).unwrap(),
            DisplayName::try_from(user).unwrap(),
            None,
        )
    }

    fn room(id: &str) -> RoomId {
        RoomId::try_from(id).unwrap()
    }

    fn draft(room_id: &str, body: &str, at: i64) -> NewMessage {
        NewMessage {
            room_id: room(room_id),
            author: identity("alice"),
            body: MessageBody::try_from(body).unwrap(),
            kind: MessageKind::Normal,
            created_at: Timestamp::new(at),
        }
    }

    #[tokio::test]
    async fn test_insert_message_assigns_durable_id() {
        // テスト項目: 保存したメッセージには一時 ID ではない ID が振られる
        // given (前提条件):
        let store = InMemoryChatStore::new();

        // when (操作):
        let message = store.insert_message(draft("r1", "hello", 1)).await.unwrap();

        // then (期待する結果):
        assert!(!message.is_ephemeral());
        assert_eq!(message.body.as_str(), "hello");
        let recent = store.query_recent_messages(&room("r1"), 100).await.unwrap();
        assert_eq!(recent, vec![message]);
    }

    #[tokio::test]
    async fn test_query_recent_messages_orders_and_limits() {
        // テスト項目: 履歴は作成時刻順で、上限件数は新しい方から取られる
        // given (前提条件):
        let store = InMemoryChatStore::new();
        store.insert_message(draft("r1", "third", 30)).await.unwrap();
        store.insert_message(draft("r1", "first", 10)).await.unwrap();
        store.insert_message(draft("r2", "other room", 15)).await.unwrap();
        store.insert_message(draft("r1", "second", 20)).await.unwrap();

        // when (操作):
        let recent = store.query_recent_messages(&room("r1"), 2).await.unwrap();

        // then (期待する結果):
        let bodies: Vec<&str> = recent.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["second", "third"]);
    }

    #[tokio::test]
    async fn test_upsert_reaction_does_not_duplicate() {
        // テスト項目: 同じ (メッセージ, ユーザー, 種類) のリアクションは 1 件に保たれる
        // given (前提条件):
        let store = InMemoryChatStore::new();
        let message = store.insert_message(draft("r1", "hello", 1)).await.unwrap();
        let reaction = Reaction {
            message_id: message.id.clone(),
            user_id: UserId::try_from("u-bob").unwrap(),
            kind: ReactionKind::try_from("fire").unwrap(),
        };

        // when (操作):
        store.upsert_reaction(reaction.clone()).await.unwrap();
        store.upsert_reaction(reaction.clone()).await.unwrap();

        // then (期待する結果):
        assert_eq!(store.reactions_for(&message.id).await, vec![reaction]);
        assert_eq!(
            store.find_message_room(&message.id).await.unwrap(),
            Some(room("r1"))
        );
    }

    #[tokio::test]
    async fn test_upsert_reaction_unknown_message() {
        // テスト項目: 存在しないメッセージへのリアクションは MessageNotFound
        // given (前提条件):
        let store = InMemoryChatStore::new();
        let reaction = Reaction {
            message_id: MessageId::new("missing".to_string()).unwrap(),
            user_id: UserId::try_from("u-bob").unwrap(),
            kind: ReactionKind::try_from("like").unwrap(),
        };

        // when (操作):
        let result = store.upsert_reaction(reaction).await;

        // then (期待する結果):
        assert_eq!(result, Err(StoreError::MessageNotFound("missing".to_string())));
    }

    #[tokio::test]
    async fn test_participants_only_online() {
        // テスト項目: 参加者一覧はオンラインのユーザーのみを返す
        // given (前提条件):
        let store = InMemoryChatStore::new();
        store
            .upsert_participant_presence(&room("r1"), &identity("bob"), true, Timestamp::new(1))
            .await
            .unwrap();
        store
            .upsert_participant_presence(&room("r1"), &identity("alice"), true, Timestamp::new(2))
            .await
            .unwrap();
        store
            .upsert_participant_presence(&room("r1"), &identity("bob"), false, Timestamp::new(3))
            .await
            .unwrap();

        // when (操作):
        let participants = store.query_participants(&room("r1")).await.unwrap();

        // then (期待する結果):
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].identity.display_name.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        // テスト項目: 障害注入中は全ての呼び出しが Unavailable で失敗する
        // given (前提条件):
        let store = InMemoryChatStore::new();
        store.set_available(false);

        // when (操作):
        let insert = store.insert_message(draft("r1", "hello", 1)).await;
        let history = store.query_recent_messages(&room("r1"), 100).await;
        let participants = store.query_participants(&room("r1")).await;

        // then (期待する結果):
        assert!(matches!(insert, Err(StoreError::Unavailable(_))));
        assert!(matches!(history, Err(StoreError::Unavailable(_))));
        assert!(matches!(participants, Err(StoreError::Unavailable(_))));

        store.set_available(true);
        assert!(store.query_recent_messages(&room("r1"), 100).await.unwrap().is_empty());
    }
}
