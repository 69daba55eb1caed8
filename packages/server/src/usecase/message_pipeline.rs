//! UseCase: メッセージ・リアクション・入力中インジケータ（Message Pipeline）
//!
//! ## 責務
//!
//! - チャットメッセージの検証 → 保存 → ルームへのブロードキャスト
//! - ストア障害時は一時 ID（`temp_...`）を付けて保存せずにブロードキャスト
//! - リアクションの保存と通知（保存に失敗したら通知しない）
//! - 履歴・参加者一覧の読み込み（失敗時は空）
//!
//! ## テスト実装の作業記録
//!
//! ### どのような状況を想定しているか
//! - 正常系：保存された ID 付きでルーム全員に new-message が届く
//! - 縮退系：ストア停止・タイムアウト時も一時 ID で届く
//! - 異常系：空の本文、未参加ルーム、存在しないメッセージへのリアクション

use std::sync::Arc;

use kaiwa_shared::time::Clock;

use crate::{
    domain::{
        ChatStore, ConnectionId, Identity, Message, MessageBody, MessageId, MessageKind,
        NewMessage, ParticipantRecord, Reaction, ReactionKind, RoomId, StoreError, Timestamp,
        ValueObjectError,
    },
    infrastructure::dto::websocket::{MessageDto, ReactionDto, ServerEvent},
};

use super::{
    degrade::with_degradation,
    error::{ReactError, SendMessageError, TypingError},
    room_broker::RoomBroker,
};

/// Number of messages delivered on join
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Read side of the store plus best-effort presence writes.
///
/// Every call degrades instead of failing.
pub struct ChatHistory {
    store: Arc<dyn ChatStore>,
    history_limit: usize,
}

impl ChatHistory {
    pub fn new(store: Arc<dyn ChatStore>, history_limit: usize) -> Self {
        Self {
            store,
            history_limit,
        }
    }

    /// Most recent messages of the room, oldest first; empty if the store fails.
    pub async fn load_history(&self, room_id: &RoomId) -> Vec<Message> {
        with_degradation(
            "query_recent_messages",
            self.store.query_recent_messages(room_id, self.history_limit),
            Vec::new,
        )
        .await
    }

    /// Online participants of the room; empty if the store fails.
    pub async fn load_participants(&self, room_id: &RoomId) -> Vec<ParticipantRecord> {
        with_degradation(
            "query_participants",
            self.store.query_participants(room_id),
            Vec::new,
        )
        .await
    }

    pub async fn record_presence(
        &self,
        room_id: &RoomId,
        identity: &Identity,
        is_online: bool,
        seen_at: Timestamp,
    ) {
        with_degradation(
            "upsert_participant_presence",
            self.store
                .upsert_participant_presence(room_id, identity, is_online, seen_at),
            || (),
        )
        .await
    }
}

pub struct MessagePipeline {
    broker: Arc<RoomBroker>,
    store: Arc<dyn ChatStore>,
    clock: Arc<dyn Clock>,
}

impl MessagePipeline {
    pub fn new(broker: Arc<RoomBroker>, store: Arc<dyn ChatStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            broker,
            store,
            clock,
        }
    }

    /// Post a chat message from a connection joined to `room_id`.
    ///
    /// The message is broadcast to the whole room even when it could not be
    /// persisted; in that case it carries a temporary id.
    pub async fn send(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        body: String,
    ) -> Result<Message, SendMessageError> {
        let connection = self
            .broker
            .connection(connection_id)
            .ok_or(SendMessageError::NotAuthenticated)?;
        if !connection.is_in(room_id) {
            return Err(SendMessageError::NotInRoom(room_id.to_string()));
        }
        let body = validate_body(body)?;

        let draft = NewMessage {
            room_id: room_id.clone(),
            author: connection.identity.clone(),
            body,
            kind: MessageKind::Normal,
            created_at: Timestamp::new(self.clock.now_millis()),
        };
        let message = self.persist(draft).await;

        self.broker.clear_typing(room_id, &connection).await;
        self.broadcast_message(&message).await;
        Ok(message)
    }

    /// Post a `system` message authored by the system identity.
    pub async fn send_system_message(
        &self,
        room_id: &RoomId,
        body: String,
    ) -> Result<Message, SendMessageError> {
        let draft = NewMessage {
            room_id: room_id.clone(),
            author: Identity::system(),
            body: validate_body(body)?,
            kind: MessageKind::System,
            created_at: Timestamp::new(self.clock.now_millis()),
        };
        let message = self.persist(draft).await;

        self.broadcast_message(&message).await;
        tracing::info!("System message '{}' posted to room '{}'", message.id, room_id);
        Ok(message)
    }

    /// Add a reaction; only broadcast once it is persisted.
    pub async fn react(
        &self,
        connection_id: &ConnectionId,
        message_id: String,
        kind: String,
    ) -> Result<Reaction, ReactError> {
        let connection = self
            .broker
            .connection(connection_id)
            .ok_or(ReactError::NotAuthenticated)?;
        let message_id =
            MessageId::new(message_id).map_err(|e| ReactError::InvalidReaction(e.to_string()))?;
        let kind =
            ReactionKind::new(kind).map_err(|e| ReactError::InvalidReaction(e.to_string()))?;

        let room_id = self
            .store
            .find_message_room(&message_id)
            .await
            .map_err(reaction_store_error)?
            .ok_or_else(|| ReactError::MessageNotFound(message_id.to_string()))?;

        let reaction = Reaction {
            message_id,
            user_id: connection.identity.user_id.clone(),
            kind,
        };
        self.store
            .upsert_reaction(reaction.clone())
            .await
            .map_err(reaction_store_error)?;

        self.broker
            .broadcast(
                &room_id,
                &ServerEvent::ReactionAdded(ReactionDto::from(reaction.clone())),
                None,
            )
            .await;
        Ok(reaction)
    }

    pub async fn typing_start(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<bool, TypingError> {
        let connection = self
            .broker
            .connection(connection_id)
            .ok_or(TypingError::NotAuthenticated)?;
        if !connection.is_in(room_id) {
            return Err(TypingError::NotInRoom(room_id.to_string()));
        }
        Ok(self.broker.mark_typing(room_id, &connection).await)
    }

    pub async fn typing_stop(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<bool, TypingError> {
        let connection = self
            .broker
            .connection(connection_id)
            .ok_or(TypingError::NotAuthenticated)?;
        if !connection.is_in(room_id) {
            return Err(TypingError::NotInRoom(room_id.to_string()));
        }
        Ok(self.broker.clear_typing(room_id, &connection).await)
    }

    async fn persist(&self, draft: NewMessage) -> Message {
        let message = with_degradation(
            "insert_message",
            self.store.insert_message(draft.clone()),
            || draft.into_ephemeral(),
        )
        .await;
        if message.is_ephemeral() {
            tracing::warn!(
                "Message in room '{}' was not persisted, broadcasting with temporary id '{}'",
                message.room_id,
                message.id
            );
        }
        message
    }

    async fn broadcast_message(&self, message: &Message) {
        let event = ServerEvent::NewMessage(MessageDto::from(message.clone()));
        let delivered = self.broker.broadcast(&message.room_id, &event, None).await;
        tracing::debug!(
            "Message '{}' delivered to {} connections in room '{}'",
            message.id,
            delivered,
            message.room_id
        );
    }
}

fn validate_body(body: String) -> Result<MessageBody, SendMessageError> {
    MessageBody::new(body).map_err(|e| match e {
        ValueObjectError::Empty(_) => SendMessageError::EmptyBody,
        ValueObjectError::TooLong { max, .. } => SendMessageError::BodyTooLong { max },
    })
}

fn reaction_store_error(e: StoreError) -> ReactError {
    match e {
        StoreError::MessageNotFound(id) => ReactError::MessageNotFound(id),
        other => {
            tracing::warn!("Reaction was not saved: {}", other);
            ReactError::Store(other)
        }
    }
}
