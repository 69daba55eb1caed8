//! Conversion logic from domain entities to DTOs.
//!
//! Conversions only go one way: inbound payloads are validated into value
//! objects by the UI layer, which needs the error to answer the client.

use crate::domain::{Connection, Identity, Message, ParticipantRecord, Reaction};
use crate::infrastructure::dto::{http, websocket as dto};
use kaiwa_shared::time::timestamp_to_rfc3339;

impl From<Message> for dto::MessageDto {
    fn from(model: Message) -> Self {
        Self {
            id: model.id.into_string(),
            room_id: model.room_id.into_string(),
            user_id: model.author.user_id.into_string(),
            display_name: model.author.display_name.into_string(),
            avatar: model.author.avatar,
            body: model.body.into_string(),
            kind: model.kind.as_str().to_string(),
            created_at: timestamp_to_rfc3339(model.created_at.value()),
        }
    }
}

impl From<ParticipantRecord> for dto::ParticipantDto {
    fn from(model: ParticipantRecord) -> Self {
        Self {
            user_id: model.identity.user_id.into_string(),
            display_name: model.identity.display_name.into_string(),
            avatar: model.identity.avatar,
            is_online: model.is_online,
            last_seen_at: timestamp_to_rfc3339(model.last_seen_at.value()),
        }
    }
}

impl From<Reaction> for dto::ReactionDto {
    fn from(model: Reaction) -> Self {
        Self {
            message_id: model.message_id.into_string(),
            user_id: model.user_id.into_string(),
            kind: model.kind.into_string(),
        }
    }
}

impl From<&Identity> for dto::UserPresencePayload {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.as_str().to_string(),
            display_name: identity.display_name.as_str().to_string(),
        }
    }
}

impl From<Connection> for http::ConnectionDto {
    fn from(model: Connection) -> Self {
        Self {
            connection_id: model.id.into_string(),
            user_id: model.identity.user_id.into_string(),
            display_name: model.identity.display_name.into_string(),
            joined_at: timestamp_to_rfc3339(model.joined_at.value()),
        }
    }
}
