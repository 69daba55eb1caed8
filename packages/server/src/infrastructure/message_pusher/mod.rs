//! メッセージ送信（通知）の実装
//!
//! ## 実装
//!
//! - `websocket`: WebSocket 接続ごとの送信チャンネルを使った実装
//! - 将来的に: 複数ノードへのファンアウト（共有 pub/sub 経由）

pub mod websocket;

pub use websocket::WebSocketMessagePusher;
