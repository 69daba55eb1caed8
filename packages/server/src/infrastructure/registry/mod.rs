//! ConnectionRegistry の実装
//!
//! - `inmemory`: プロセス内の HashMap を使った実装
//! - 将来的に: 複数ノード構成向けの共有ストア実装

pub mod inmemory;

pub use inmemory::InMemoryConnectionRegistry;
