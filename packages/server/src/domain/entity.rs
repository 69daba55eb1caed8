//! Domain entities.

use super::value_object::{
    ConnectionId, DisplayName, MessageBody, MessageId, ReactionKind, RoomId, Timestamp, UserId,
};

/// User id of the author of system messages.
pub const SYSTEM_USER_ID: &str = "00000000-0000-0000-0000-000000000000";
/// Display name of the author of system messages.
pub const SYSTEM_DISPLAY_NAME: &str = "System";

/// Authenticated user attributes attached to a connection at admission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: DisplayName,
    pub avatar: Option<String>,
}

impl Identity {
    pub fn new(user_id: UserId, display_name: DisplayName, avatar: Option<String>) -> Self {
        Self {
            user_id,
            display_name,
            avatar,
        }
    }

    /// The identity that authors system messages.
    pub fn system() -> Self {
        Self {
            user_id: UserId(SYSTEM_USER_ID.to_string()),
            display_name: DisplayName(SYSTEM_DISPLAY_NAME.to_string()),
            avatar: None,
        }
    }
}

/// One live transport session that has claimed an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    /// Room the connection is currently joined to
    pub room: Option<RoomId>,
    pub joined_at: Timestamp,
}

impl Connection {
    pub fn new(id: ConnectionId, identity: Identity, joined_at: Timestamp) -> Self {
        Self {
            id,
            identity,
            room: None,
            joined_at,
        }
    }

    pub fn is_in(&self, room_id: &RoomId) -> bool {
        self.room.as_ref() == Some(room_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Normal,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Normal => "normal",
            MessageKind::System => "system",
        }
    }
}

/// A message that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub author: Identity,
    pub body: MessageBody,
    pub kind: MessageKind,
    pub created_at: Timestamp,
}

impl NewMessage {
    /// Assign a durable id, as the store does on insert.
    pub fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            room_id: self.room_id,
            author: self.author,
            body: self.body,
            kind: self.kind,
            created_at: self.created_at,
        }
    }

    /// Build the non-durable record broadcast when the store is unavailable.
    pub fn into_ephemeral(self) -> Message {
        self.into_message(MessageId::temporary())
    }
}

/// A chat message as broadcast and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub author: Identity,
    pub body: MessageBody,
    pub kind: MessageKind,
    pub created_at: Timestamp,
}

impl Message {
    /// Whether this message was synthesized in degraded mode.
    pub fn is_ephemeral(&self) -> bool {
        self.id.is_temporary()
    }
}

/// A reaction; (message_id, user_id, kind) is unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reaction {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub kind: ReactionKind,
}

/// Persisted presence flag per (room, user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    pub room_id: RoomId,
    pub identity: Identity,
    pub is_online: bool,
    pub last_seen_at: Timestamp,
}
