//! UseCase layer.
//!
//! Orchestrates the domain traits: admission, room membership and fan-out,
//! the message pipeline, and the periodic presence sweep.

pub mod access_gate;
pub mod degrade;
pub mod error;
pub mod message_pipeline;
pub mod presence_reconciler;
pub mod room_broker;

#[cfg(test)]
pub(crate) mod testing;

pub use access_gate::AccessGate;
pub use degrade::with_degradation;
pub use error::{AdmitError, JoinError, LeaveError, ReactError, SendMessageError, TypingError};
pub use message_pipeline::{ChatHistory, DEFAULT_HISTORY_LIMIT, MessagePipeline};
pub use presence_reconciler::{
    DEFAULT_RECONCILE_GRACE, DEFAULT_RECONCILE_INTERVAL, PresenceReconciler,
};
pub use room_broker::{BrokerStats, JoinOutcome, RoomBroker};
