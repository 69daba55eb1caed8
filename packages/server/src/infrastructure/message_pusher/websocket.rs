//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの `UnboundedSender` を管理
//! - クライアントへのメッセージ送信（push_to, broadcast）
//! - 送信チャンネルが閉じているか（トランスポートが死んでいるか）の判定
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された `UnboundedSender` を受け取り、メッセージ送信に使用します。
//!
//! broadcast はロックを保持したまま全宛先のチャンネルに積むため、
//! 同じルームへのブロードキャストは全メンバーに同じ順序で届きます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ConnectionId, MessagePushError, MessagePusher, PusherChannel};

/// WebSocket を使った MessagePusher 実装
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// Key: connection id, Value: 送信チャンネル
    clients: Mutex<HashMap<ConnectionId, PusherChannel>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut clients = self.clients.lock().await;
        tracing::debug!("Connection '{}' registered to MessagePusher", connection_id);
        clients.insert(connection_id, sender);
    }

    async fn unregister_client(&self, connection_id: &ConnectionId) {
        let mut clients = self.clients.lock().await;
        if clients.remove(connection_id).is_some() {
            tracing::debug!("Connection '{}' unregistered from MessagePusher", connection_id);
        }
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let clients = self.clients.lock().await;

        let sender = clients
            .get(connection_id)
            .ok_or_else(|| MessagePushError::ClientNotFound(connection_id.to_string()))?;
        sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::trace!("Pushed frame to connection '{}'", connection_id);
        Ok(())
    }

    async fn broadcast(&self, targets: Vec<ConnectionId>, content: &str) -> usize {
        let clients = self.clients.lock().await;
        let mut delivered = 0;

        for target in targets {
            match clients.get(&target) {
                // ブロードキャストでは一部の送信失敗を許容
                Some(sender) => match sender.send(content.to_string()) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        tracing::warn!("Failed to push frame to connection '{}': {}", target, e);
                    }
                },
                None => {
                    tracing::warn!(
                        "Connection '{}' not found during broadcast, skipping",
                        target
                    );
                }
            }
        }

        delivered
    }

    async fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        let clients = self.clients.lock().await;
        clients
            .get(connection_id)
            .is_some_and(|sender| !sender.is_closed())
    }

    async fn count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - push_to: 特定の接続への送信
    // - broadcast: 複数接続への送信と部分失敗の許容
    // - is_connected: 受信側が閉じた接続の検出
    // ========================================

    #[tokio::test]
    async fn test_push_to_success() {
        // テスト項目: 特定の接続にメッセージを送信できる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::generate();
        pusher.register_client(conn.clone(), tx).await;

        // when (操作):
        let result = pusher.push_to(&conn, "Hello").await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx.recv().await, Some("Hello".to_string()));
    }

    #[tokio::test]
    async fn test_push_to_client_not_found() {
        // テスト項目: 存在しない接続への送信はエラーを返す
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();

        // when (操作):
        let result = pusher.push_to(&ConnectionId::generate(), "Hello").await;

        // then (期待する結果):
        assert!(matches!(result, Err(MessagePushError::ClientNotFound(_))));
    }

    #[tokio::test]
    async fn test_broadcast_success() {
        // テスト項目: 複数の接続にメッセージをブロードキャストできる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let alice = ConnectionId::generate();
        let bob = ConnectionId::generate();
        pusher.register_client(alice.clone(), tx1).await;
        pusher.register_client(bob.clone(), tx2).await;

        // when (操作):
        let delivered = pusher.broadcast(vec![alice, bob], "Broadcast message").await;

        // then (期待する結果):
        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().await, Some("Broadcast message".to_string()));
        assert_eq!(rx2.recv().await, Some("Broadcast message".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_isolates_dead_recipient() {
        // テスト項目: 受信側が死んでいる接続があっても他の接続には届く
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_alive, mut rx_alive) = mpsc::unbounded_channel();
        let dead = ConnectionId::generate();
        let alive = ConnectionId::generate();
        let missing = ConnectionId::generate();
        pusher.register_client(dead.clone(), tx_dead).await;
        pusher.register_client(alive.clone(), tx_alive).await;
        drop(rx_dead);

        // when (操作):
        let delivered = pusher
            .broadcast(vec![dead, missing, alive], "Broadcast message")
            .await;

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert_eq!(rx_alive.recv().await, Some("Broadcast message".to_string()));
    }

    #[tokio::test]
    async fn test_is_connected_detects_closed_channel() {
        // テスト項目: 受信側が閉じた接続は未接続と判定される
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::generate();
        pusher.register_client(conn.clone(), tx).await;
        let connected_before = pusher.is_connected(&conn).await;

        // when (操作):
        drop(rx);

        // then (期待する結果):
        assert!(connected_before);
        assert!(!pusher.is_connected(&conn).await);
        assert!(!pusher.is_connected(&ConnectionId::generate()).await);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        // テスト項目: 登録解除は冪等
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::generate();
        pusher.register_client(conn.clone(), tx).await;

        // when (操作):
        pusher.unregister_client(&conn).await;
        pusher.unregister_client(&conn).await;

        // then (期待する結果):
        assert_eq!(pusher.count().await, 0);
    }
}
