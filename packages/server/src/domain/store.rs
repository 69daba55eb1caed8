//! Persistence collaborator trait 定義
//!
//! メッセージ・リアクション・参加者の永続化先（リレーショナルストア）へのインターフェース。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! 全てのメソッドは失敗し得ます。呼び出し側（UseCase 層）は失敗時の縮退動作を
//! 必ず定義しなければなりません。

use async_trait::async_trait;

use super::{
    Identity, Message, MessageId, NewMessage, ParticipantRecord, Reaction, RoomId, StoreError,
    Timestamp,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist a message and return the canonical record with its durable id.
    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// Insert or replace the reaction keyed by (message, user, kind).
    async fn upsert_reaction(&self, reaction: Reaction) -> Result<(), StoreError>;

    /// Room the message was posted in, `None` if the message does not exist.
    async fn find_message_room(&self, message_id: &MessageId)
    -> Result<Option<RoomId>, StoreError>;

    /// Non-deleted messages of a room, oldest first, at most `limit` (the most recent ones).
    async fn query_recent_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;

    /// Participants currently flagged online in a room.
    async fn query_participants(&self, room_id: &RoomId)
    -> Result<Vec<ParticipantRecord>, StoreError>;

    async fn upsert_participant_presence(
        &self,
        room_id: &RoomId,
        identity: &Identity,
        is_online: bool,
        seen_at: Timestamp,
    ) -> Result<(), StoreError>;
}
