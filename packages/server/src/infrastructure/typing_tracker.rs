//! Typing indicator tracker.
//!
//! Per room, the set of display names currently typing. Each (room, name) key
//! owns at most one pending auto-clear task; marking again cancels it and
//! schedules a new one. Expirations are reported on a channel so the broker can
//! tell the room.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::mpsc, task::JoinHandle};

use crate::domain::{DisplayName, RoomId};

/// Default auto-clear window
pub const DEFAULT_TYPING_EXPIRY: Duration = Duration::from_secs(3);

/// A typing state that was cleared by the auto-expiry timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingExpired {
    pub room_id: RoomId,
    pub display_name: DisplayName,
}

struct PendingClear {
    generation: u64,
    handle: JoinHandle<()>,
}

type TypingMap = HashMap<RoomId, HashMap<DisplayName, PendingClear>>;

pub struct TypingTracker {
    rooms: Arc<Mutex<TypingMap>>,
    expiry: Duration,
    expired_tx: mpsc::UnboundedSender<TypingExpired>,
    generation: AtomicU64,
}

fn lock(rooms: &Mutex<TypingMap>) -> MutexGuard<'_, TypingMap> {
    rooms.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Remove the key if it is still owned by `generation`.
fn remove_if_current(
    rooms: &Mutex<TypingMap>,
    room_id: &RoomId,
    name: &DisplayName,
    generation: u64,
) -> bool {
    let mut rooms = lock(rooms);
    let Some(typing) = rooms.get_mut(room_id) else {
        return false;
    };
    if typing.get(name).is_none_or(|pending| pending.generation != generation) {
        return false;
    }
    typing.remove(name);
    if typing.is_empty() {
        rooms.remove(room_id);
    }
    true
}

impl TypingTracker {
    /// Create a tracker and the receiver of its expirations.
    pub fn new(expiry: Duration) -> (Self, mpsc::UnboundedReceiver<TypingExpired>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let tracker = Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            expiry,
            expired_tx,
            generation: AtomicU64::new(0),
        };
        (tracker, expired_rx)
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Mark `name` as typing in `room_id` and (re)schedule its auto-clear.
    ///
    /// Returns `true` if the key was idle before. Must be called from within a
    /// tokio runtime.
    pub fn mark_typing(&self, room_id: &RoomId, name: &DisplayName) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        // Held until the entry is inserted, so the expiry task cannot look it up first.
        let mut typing = lock(&self.rooms);
        let handle = {
            let rooms = self.rooms.clone();
            let expired_tx = self.expired_tx.clone();
            let expiry = self.expiry;
            let room_id = room_id.clone();
            let name = name.clone();
            tokio::spawn(async move {
                tokio::time::sleep(expiry).await;
                if remove_if_current(&rooms, &room_id, &name, generation) {
                    tracing::debug!("Typing state of '{}' in room '{}' expired", name, room_id);
                    let _ = expired_tx.send(TypingExpired {
                        room_id,
                        display_name: name,
                    });
                }
            })
        };

        let previous = typing
            .entry(room_id.clone())
            .or_default()
            .insert(name.clone(), PendingClear { generation, handle });
        drop(typing);

        match previous {
            Some(pending) => {
                pending.handle.abort();
                false
            }
            None => true,
        }
    }

    /// Clear immediately and cancel the pending auto-clear.
    ///
    /// Returns `true` if the key was typing.
    pub fn clear_typing(&self, room_id: &RoomId, name: &DisplayName) -> bool {
        let mut rooms = lock(&self.rooms);
        let Some(typing) = rooms.get_mut(room_id) else {
            return false;
        };
        let removed = typing.remove(name);
        if typing.is_empty() {
            rooms.remove(room_id);
        }
        match removed {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_typing(&self, room_id: &RoomId, name: &DisplayName) -> bool {
        lock(&self.rooms)
            .get(room_id)
            .is_some_and(|typing| typing.contains_key(name))
    }

    /// Display names currently typing in a room, sorted.
    pub fn typing_in(&self, room_id: &RoomId) -> Vec<DisplayName> {
        let mut names: Vec<DisplayName> = lock(&self.rooms)
            .get(room_id)
            .map(|typing| typing.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Number of rooms with at least one typing identity
    pub fn active_rooms(&self) -> usize {
        lock(&self.rooms).len()
    }
}

impl Drop for TypingTracker {
    fn drop(&mut self) {
        for typing in lock(&self.rooms).values() {
            for pending in typing.values() {
                pending.handle.abort();
            }
        }
    }
}
