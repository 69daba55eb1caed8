//! Server state shared by every handler.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::usecase::{AccessGate, MessagePipeline, RoomBroker};

/// Shared application state
pub struct AppState {
    /// Origin gate evaluated before the WebSocket upgrade
    pub access_gate: AccessGate,
    /// Room membership and fan-out
    pub broker: Arc<RoomBroker>,
    /// Message, reaction and typing pipeline
    pub pipeline: Arc<MessagePipeline>,
    /// Cancelled once on shutdown; open sockets close when it fires
    pub shutdown: CancellationToken,
}
