//! ChatStore の実装
//!
//! - `inmemory`: プロセス内メモリを使った実装（開発・テスト用、障害注入スイッチ付き）
//! - `timeout`: 任意の ChatStore の各呼び出しに上限時間を課すデコレータ

pub mod inmemory;
pub mod timeout;

pub use inmemory::InMemoryChatStore;
pub use timeout::TimeoutChatStore;
