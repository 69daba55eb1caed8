//! Connection registry trait 定義
//!
//! プロセス内で生きている接続と、その接続が名乗った identity・参加中のルームを管理する。
//! 全操作は同期的で、複数の接続タスクから同時に呼ばれても一貫したスナップショットを返すこと。

use std::collections::HashMap;

use super::{Connection, ConnectionId, Identity, RegistryError, RoomId, Timestamp};

/// Whether one user id may hold several live connections at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub allow_multiple_sessions: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            allow_multiple_sessions: true,
        }
    }
}

pub trait ConnectionRegistry: Send + Sync {
    /// Record an identified connection with no room
    fn admit(
        &self,
        connection_id: ConnectionId,
        identity: Identity,
        joined_at: Timestamp,
    ) -> Result<Connection, RegistryError>;

    /// Point the connection at `room` and return the previous room.
    ///
    /// No-op when unchanged.
    fn set_room(
        &self,
        connection_id: &ConnectionId,
        room: Option<RoomId>,
    ) -> Result<Option<RoomId>, RegistryError>;

    /// Delete the entry; only the first caller gets `Some`.
    fn remove(&self, connection_id: &ConnectionId) -> Option<Connection>;

    fn find(&self, connection_id: &ConnectionId) -> Option<Connection>;

    fn list_by_room(&self, room_id: &RoomId) -> Vec<Connection>;

    fn list_all(&self) -> Vec<Connection>;

    fn count(&self) -> usize;

    /// Number of connections per occupied room
    fn room_counts(&self) -> HashMap<RoomId, usize>;
}
