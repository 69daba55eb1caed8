//! Domain layer.
//!
//! Value objects, entities, and the interfaces (traits) the broker needs from
//! the outside world. Concrete implementations live in `infrastructure`.

pub mod access;
pub mod entity;
pub mod error;
pub mod message_pusher;
pub mod registry;
pub mod store;
pub mod value_object;

pub use access::{AccessDecision, ConnectionRequest, GateMode, OriginPolicy, OriginRule};
pub use entity::{Connection, Identity, Message, MessageKind, NewMessage, ParticipantRecord, Reaction};
pub use error::{MessagePushError, RegistryError, StoreError, ValueObjectError};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use registry::{ConnectionRegistry, SessionPolicy};
pub use store::ChatStore;
pub use value_object::{
    ConnectionId, DisplayName, MessageBody, MessageId, ReactionKind, RoomId, Timestamp, UserId,
};

#[cfg(test)]
pub use message_pusher::MockMessagePusher;
#[cfg(test)]
pub use store::MockChatStore;
