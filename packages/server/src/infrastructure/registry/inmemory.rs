//! InMemory Connection Registry 実装
//!
//! ドメイン層が定義する ConnectionRegistry trait の具体的な実装。
//! 1 インスタンスにつき 1 つの Mutex で HashMap を保護します。
//! ロック区間内で await しないため、`std::sync::Mutex` を使用しています。

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::domain::{
    Connection, ConnectionId, ConnectionRegistry, Identity, RegistryError, RoomId, SessionPolicy,
    Timestamp,
};

/// インメモリ Connection Registry 実装
pub struct InMemoryConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    policy: SessionPolicy,
}

impl InMemoryConnectionRegistry {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        // Every mutation is a single map operation, so a poisoned map is still consistent.
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryConnectionRegistry {
    fn default() -> Self {
        Self::new(SessionPolicy::default())
    }
}

impl ConnectionRegistry for InMemoryConnectionRegistry {
    fn admit(
        &self,
        connection_id: ConnectionId,
        identity: Identity,
        joined_at: Timestamp,
    ) -> Result<Connection, RegistryError> {
        let mut connections = self.lock();

        if connections.contains_key(&connection_id) {
            return Err(RegistryError::AlreadyAdmitted(
                connection_id.into_string(),
            ));
        }

        if !self.policy.allow_multiple_sessions
            && connections
                .values()
                .any(|c| c.identity.user_id == identity.user_id)
        {
            return Err(RegistryError::DuplicateIdentity(
                identity.user_id.into_string(),
            ));
        }

        let connection = Connection::new(connection_id.clone(), identity, joined_at);
        connections.insert(connection_id, connection.clone());
        Ok(connection)
    }

    fn set_room(
        &self,
        connection_id: &ConnectionId,
        room: Option<RoomId>,
    ) -> Result<Option<RoomId>, RegistryError> {
        let mut connections = self.lock();
        let connection = connections
            .get_mut(connection_id)
            .ok_or_else(|| RegistryError::ConnectionNotFound(connection_id.to_string()))?;

        if connection.room == room {
            return Ok(room);
        }
        Ok(std::mem::replace(&mut connection.room, room))
    }

    fn remove(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.lock().remove(connection_id)
    }

    fn find(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.lock().get(connection_id).cloned()
    }

    fn list_by_room(&self, room_id: &RoomId) -> Vec<Connection> {
        let mut members: Vec<Connection> = self
            .lock()
            .values()
            .filter(|c| c.is_in(room_id))
            .cloned()
            .collect();
        // Stable order for fan-out and for the HTTP listing
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        members
    }

    fn list_all(&self) -> Vec<Connection> {
        self.lock().values().cloned().collect()
    }

    fn count(&self) -> usize {
        self.lock().len()
    }

    fn room_counts(&self) -> HashMap<RoomId, usize> {
        let mut counts = HashMap::new();
        for room in self.lock().values().filter_map(|c| c.room.clone()) {
            *counts.entry(room).or_insert(0) += 1;
        }
        counts
    }
}
