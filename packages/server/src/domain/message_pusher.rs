//! MessagePusher trait 定義
//!
//! 接続中のクライアントへのメッセージ送信（通知）の抽象化。
//! UseCase 層はこの trait に依存し、WebSocket などの具体的な送信手段には依存しない。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ConnectionId, MessagePushError};

/// Outbound channel of one connection (serialized JSON frames)
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Register the outbound channel of a freshly upgraded socket
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// Drop the outbound channel; idempotent
    async fn unregister_client(&self, connection_id: &ConnectionId);

    /// Deliver to a single connection
    async fn push_to(&self, connection_id: &ConnectionId, content: &str)
    -> Result<(), MessagePushError>;

    /// Deliver to every target; a failing recipient is skipped, not fatal.
    ///
    /// Returns the number of recipients the frame was handed to.
    async fn broadcast(&self, targets: Vec<ConnectionId>, content: &str) -> usize;

    /// Whether the connection's transport is still able to receive frames
    async fn is_connected(&self, connection_id: &ConnectionId) -> bool;

    /// Number of registered outbound channels
    async fn count(&self) -> usize;
}
