//! WebSocket event DTOs.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<kebab-case-name>", "data": {...}}` with camelCase fields.
//! The set of events is closed: anything that does not deserialize into
//! [`ClientEvent`] is rejected at the transport boundary.

use serde::{Deserialize, Serialize};

// ========================================
// Client → Server
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    IdentityClaim(IdentityClaimPayload),
    JoinRoom(RoomPayload),
    LeaveRoom(RoomPayload),
    SendMessage(SendMessagePayload),
    TypingStart(RoomPayload),
    TypingStop(RoomPayload),
    AddReaction(AddReactionPayload),
    Ping,
}

impl ClientEvent {
    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::IdentityClaim(_) => "identity-claim",
            ClientEvent::JoinRoom(_) => "join-room",
            ClientEvent::LeaveRoom(_) => "leave-room",
            ClientEvent::SendMessage(_) => "send-message",
            ClientEvent::TypingStart(_) => "typing-start",
            ClientEvent::TypingStop(_) => "typing-stop",
            ClientEvent::AddReaction(_) => "add-reaction",
            ClientEvent::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaimPayload {
    pub user_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub room_id: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReactionPayload {
    pub message_id: String,
    pub kind: String,
}

// ========================================
// Server → Client
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(ConnectedPayload),
    Authenticated(AuthenticatedPayload),
    History(Vec<MessageDto>),
    ParticipantsUpdated(Vec<ParticipantDto>),
    JoinedRoom(JoinedRoomPayload),
    LeftRoom(RoomPayload),
    NewMessage(MessageDto),
    UserJoined(UserPresencePayload),
    UserLeft(UserPresencePayload),
    UserTyping(TypingPayload),
    UserStopTyping(TypingPayload),
    ReactionAdded(ReactionDto),
    Error(ErrorPayload),
    AuthError(ErrorPayload),
    Pong(PongPayload),
}

impl ServerEvent {
    /// Private `error` event
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            message: message.into(),
            code: Some(code),
        })
    }

    /// Private `auth-error` event
    pub fn auth_error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerEvent::AuthError(ErrorPayload {
            message: message.into(),
            code: Some(code),
        })
    }

    /// Serialize into a text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub connection_id: String,
    /// RFC 3339
    pub server_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedPayload {
    pub connection_id: String,
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRoomPayload {
    pub room_id: String,
    pub message_count: usize,
    pub participant_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresencePayload {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongPayload {
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

/// Machine-readable error codes carried by `error` / `auth-error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Frame is not a known event or its payload is malformed
    InvalidEvent,
    NotAuthenticated,
    AlreadyAuthenticated,
    DuplicateIdentity,
    InvalidIdentity,
    InvalidRoom,
    NotInRoom,
    EmptyBody,
    BodyTooLong,
    InvalidReaction,
    ReactionFailed,
}

/// A chat message as broadcast to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    /// Durable id, or `temp_...` when the store was unavailable
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub body: String,
    /// `normal` | `system`
    pub kind: String,
    /// RFC 3339
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub user_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub is_online: bool,
    /// RFC 3339
    pub last_seen_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionDto {
    pub message_id: String,
    pub user_id: String,
    pub kind: String,
}
