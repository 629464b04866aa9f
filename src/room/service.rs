use std::sync::Arc;

use chrono::Utc;

use super::model::{generate_room_code, Room};
use super::store::RoomStore;
use super::transitions;
use crate::error::{DuelError, Result};
use crate::realtime::RealtimeGateway;

/// Orchestrates the pure room transitions against the store and pushes
/// every committed snapshot through the realtime gateway.
///
/// Each operation re-reads the room immediately before computing and
/// writing the full next document; there is no held lock across
/// operations, so two racing actions on the same code resolve as last
/// write wins (see the note on [`RoomStore::update`]).
pub struct RoomService<S: RoomStore> {
    store: S,
    gateway: Arc<RealtimeGateway>,
}

impl<S: RoomStore> RoomService<S> {
    pub fn new(store: S, gateway: Arc<RealtimeGateway>) -> Self {
        Self { store, gateway }
    }

    pub fn gateway(&self) -> &Arc<RealtimeGateway> {
        &self.gateway
    }

    /// Open a new lobby room hosted by `host_id`. A host still sitting in
    /// another active room is first walked through the leave transition
    /// there (host handoff and deactivation rules included).
    ///
    /// The new room is not broadcast: the creator has not subscribed to
    /// its channel yet and takes the state from the HTTP response.
    pub async fn create_room(
        &self,
        problem_id: &str,
        host_id: &str,
        host_name: &str,
    ) -> Result<Room> {
        self.evict_from_other_room(host_id, None).await?;

        let code = self.generate_unique_code().await?;
        let room = Room::new_lobby(code, problem_id, host_id, host_name);
        self.store.insert(room.clone()).await?;

        tracing::info!(
            room_code = %room.code,
            host_id = %host_id,
            problem_id = %problem_id,
            "Room created"
        );
        Ok(room)
    }

    /// Add a player to the lobby identified by `code`. Idempotent for a
    /// player already in it; membership in any other active room is
    /// terminated first.
    pub async fn join_room(&self, code: &str, player_id: &str, name: &str) -> Result<Room> {
        self.evict_from_other_room(player_id, Some(code)).await?;

        let room = self.require_room(code).await?;
        let next = transitions::join(room, player_id, name)?;
        self.store.update(next.clone()).await?;
        self.gateway.broadcast(&next).await;

        tracing::info!(room_code = %code, player_id = %player_id, "Player joined room");
        Ok(next)
    }

    /// Remove a player, deactivating an emptied room or handing the host
    /// role to the first remaining player.
    pub async fn leave_room(&self, code: &str, player_id: &str) -> Result<Room> {
        let room = self.require_room(code).await?;
        let next = transitions::leave(room, player_id);
        self.store.update(next.clone()).await?;
        self.gateway.broadcast(&next).await;

        tracing::info!(
            room_code = %code,
            player_id = %player_id,
            active = next.active,
            "Player left room"
        );
        Ok(next)
    }

    /// Host closes the room without clearing the player list
    pub async fn cancel_room(&self, code: &str, actor_id: &str) -> Result<Room> {
        let room = self.require_room(code).await?;
        let next = transitions::cancel(room, actor_id)?;
        self.store.update(next.clone()).await?;
        self.gateway.broadcast(&next).await;

        tracing::info!(room_code = %code, "Room canceled by host");
        Ok(next)
    }

    /// Host starts the game; every player's completion state is reset
    pub async fn start_room(&self, code: &str, actor_id: &str) -> Result<Room> {
        let room = self.require_room(code).await?;
        let next = transitions::start(room, actor_id)?;
        self.store.update(next.clone()).await?;
        self.gateway.broadcast(&next).await;

        tracing::info!(room_code = %code, players = next.players.len(), "Game started");
        Ok(next)
    }

    /// Mark a player's submission as passed. Silently returns when the
    /// room is absent or has not started; repeated calls for an already
    /// completed player change nothing. When the last player completes,
    /// the room finishes and closes in the same write.
    pub async fn record_completion(&self, code: &str, player_id: &str) -> Result<Option<Room>> {
        let Some(room) = self.store.find_by_code(code).await? else {
            return Ok(None);
        };
        if !room.started {
            return Ok(None);
        }

        let outcome = transitions::record_completion(room, player_id, Utc::now());
        if !outcome.changed {
            // Already-completed player or unknown id: nothing to persist,
            // nothing to push
            return Ok(Some(outcome.room));
        }
        if outcome.room.game_completed {
            tracing::info!(room_code = %code, "All players completed, room finished");
        }

        self.store.update(outcome.room.clone()).await?;
        self.gateway.broadcast(&outcome.room).await;
        Ok(Some(outcome.room))
    }

    /// The at-most-one active room this player currently belongs to
    pub async fn find_room_for_player(&self, player_id: &str) -> Result<Option<Room>> {
        self.store.find_active_by_player(player_id).await
    }

    /// Current snapshot for a code, used by the gateway's subscribe sync
    pub async fn snapshot(&self, code: &str) -> Result<Option<Room>> {
        self.store.find_by_code(code).await
    }

    async fn require_room(&self, code: &str) -> Result<Room> {
        self.store
            .find_by_code(code)
            .await?
            .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))
    }

    /// A player joins or hosts at most one active room at a time: any
    /// prior membership is terminated through the normal leave transition,
    /// broadcast included.
    async fn evict_from_other_room(&self, player_id: &str, target_code: Option<&str>) -> Result<()> {
        let Some(prior) = self.store.find_active_by_player(player_id).await? else {
            return Ok(());
        };
        if target_code == Some(prior.code.as_str()) {
            return Ok(());
        }

        tracing::info!(
            player_id = %player_id,
            room_code = %prior.code,
            "Removing player from prior active room"
        );
        let next = transitions::leave(prior, player_id);
        self.store.update(next.clone()).await?;
        self.gateway.broadcast(&next).await;
        Ok(())
    }

    /// Codes only need to be unique among active rooms, so the loop
    /// retries until the candidate collides with none of them. Collisions
    /// are rare at this code length but the loop is required for
    /// correctness, not a nicety.
    async fn generate_unique_code(&self) -> Result<String> {
        loop {
            let code = generate_room_code();
            if self.store.find_active_by_code(&code).await?.is_none() {
                return Ok(code);
            }
            tracing::debug!(room_code = %code, "Room code collision, regenerating");
        }
    }
}
