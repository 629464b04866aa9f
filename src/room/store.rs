use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::model::Room;
use crate::error::Result;

/// Abstract persistence for room documents.
///
/// The store offers no multi-document transaction and `update` is a plain
/// last-write-wins replace: transitions must compute the complete next
/// document from a fresh read immediately before writing. Two writers
/// racing on the same code can lose an update; this is a known gap, not
/// something the store papers over.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Persist a new room, returning its id
    async fn insert(&self, room: Room) -> Result<String>;

    /// Look up a room by code, active or not. When several historical
    /// rooms share a code, the active one wins.
    async fn find_by_code(&self, code: &str) -> Result<Option<Room>>;

    /// Look up only among active rooms
    async fn find_active_by_code(&self, code: &str) -> Result<Option<Room>>;

    /// The at-most-one active room this player belongs to
    async fn find_active_by_player(&self, player_id: &str) -> Result<Option<Room>>;

    /// Replace the stored document for `room.id` with `room`
    async fn update(&self, room: Room) -> Result<()>;
}

/// In-memory store keyed by room id
pub struct InMemoryRoomStore {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryRoomStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn insert(&self, room: Room) -> Result<String> {
        let id = room.id.clone();
        let mut rooms = self.rooms.write().await;
        rooms.insert(id.clone(), room);
        Ok(id)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Room>> {
        let rooms = self.rooms.read().await;
        let mut found: Option<Room> = None;
        for room in rooms.values() {
            if room.code == code {
                if room.active {
                    return Ok(Some(room.clone()));
                }
                found.get_or_insert_with(|| room.clone());
            }
        }
        Ok(found)
    }

    async fn find_active_by_code(&self, code: &str) -> Result<Option<Room>> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .values()
            .find(|r| r.active && r.code == code)
            .cloned())
    }

    async fn find_active_by_player(&self, player_id: &str) -> Result<Option<Room>> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .values()
            .find(|r| r.active && r.has_player(player_id))
            .cloned())
    }

    async fn update(&self, room: Room) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        rooms.insert(room.id.clone(), room);
        Ok(())
    }
}
