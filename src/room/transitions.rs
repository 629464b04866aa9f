//! Pure transitions over room documents.
//!
//! Each function takes the current document and returns the complete next
//! document (or a rejection) without touching storage, so callers persist
//! a single full write per action. The three lifecycle flags are one-way:
//! `started` false→true, `active` true→false, `game_completed` false→true,
//! and `game_completed` is only set together with `active = false`.

use chrono::{DateTime, Utc};

use super::model::{Player, Room};
use crate::error::{DuelError, Result};

/// Append a player to a lobby room. Idempotent for a player already in
/// the room. Rejected once the room has closed or started.
pub fn join(mut room: Room, player_id: &str, name: &str) -> Result<Room> {
    if !room.active {
        return Err(DuelError::RoomClosed(room.code));
    }
    if room.started {
        return Err(DuelError::RoomStarted(room.code));
    }

    if !room.has_player(player_id) {
        room.players.push(Player::new(player_id, name));
    }

    Ok(room)
}

/// Remove a player. An emptied room deactivates in the same transition;
/// otherwise a departing host hands off to the first remaining player.
pub fn leave(mut room: Room, player_id: &str) -> Room {
    let was_host = room.is_host(player_id);
    room.players.retain(|p| p.id != player_id);

    if room.players.is_empty() {
        room.active = false;
    } else if was_host {
        room.host_id = room.players[0].id.clone();
    }

    room
}

/// Host closes the room. The player list is left untouched.
pub fn cancel(mut room: Room, actor_id: &str) -> Result<Room> {
    if !room.is_host(actor_id) {
        return Err(DuelError::NotHost(room.code));
    }

    room.active = false;
    Ok(room)
}

/// Host starts the game. Every player gets a fresh completion slate.
/// Rejected once the room has closed.
pub fn start(mut room: Room, actor_id: &str) -> Result<Room> {
    if !room.active {
        return Err(DuelError::RoomClosed(room.code));
    }
    if !room.is_host(actor_id) {
        return Err(DuelError::NotHost(room.code));
    }

    room.started = true;
    for player in &mut room.players {
        player.completed = Some(false);
        player.completed_at = None;
    }

    Ok(room)
}

/// Outcome of a completion transition
pub struct CompletionOutcome {
    pub room: Room,
    /// False when the transition was a no-op (not started, unknown player,
    /// or the player had already completed)
    pub changed: bool,
}

/// Mark a player's submission as passed. Idempotent: a player who already
/// completed keeps their original `completed_at`. When the last player
/// completes, `game_completed` and `active` flip together.
pub fn record_completion(mut room: Room, player_id: &str, now: DateTime<Utc>) -> CompletionOutcome {
    if !room.started {
        return CompletionOutcome {
            room,
            changed: false,
        };
    }

    let mut changed = false;
    if let Some(player) = room.players.iter_mut().find(|p| p.id == player_id) {
        if !player.is_completed() {
            player.completed = Some(true);
            player.completed_at = Some(now);
            changed = true;
        }
    }

    let all_completed = room.players.iter().all(|p| p.is_completed());
    if all_completed && !room.game_completed {
        room.game_completed = true;
        room.active = false;
        changed = true;
    }

    CompletionOutcome { room, changed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::model::generate_room_code;

    fn lobby() -> Room {
        Room::new_lobby(generate_room_code(), "prob-1", "h1", "host")
    }

    fn two_player_room() -> Room {
        let room = lobby();
        join(room, "p2", "bob").unwrap()
    }

    #[test]
    fn test_join_appends_in_order() {
        let room = lobby();
        let room = join(room, "p2", "bob").unwrap();
        let room = join(room, "p3", "carol").unwrap();

        let ids: Vec<&str> = room.players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "p2", "p3"]);
    }

    #[test]
    fn test_join_is_idempotent() {
        let room = two_player_room();
        let room = join(room, "p2", "bob").unwrap();
        assert_eq!(room.players.len(), 2);
    }

    #[test]
    fn test_join_closed_room_rejected() {
        let mut room = lobby();
        room.active = false;
        let err = join(room, "p2", "bob").unwrap_err();
        assert!(matches!(err, DuelError::RoomClosed(_)));
    }

    #[test]
    fn test_join_started_room_rejected_regardless_of_active() {
        let mut room = two_player_room();
        room.started = true;
        let err = join(room.clone(), "p3", "carol").unwrap_err();
        assert!(matches!(err, DuelError::RoomStarted(_)));

        // started wins over closed-room ordering only when active; a
        // closed and started room still rejects
        room.active = false;
        let err = join(room, "p3", "carol").unwrap_err();
        assert!(matches!(err, DuelError::RoomClosed(_)));
    }

    #[test]
    fn test_leave_reassigns_host_to_first_remaining() {
        let room = two_player_room();
        let room = leave(room, "h1");
        assert_eq!(room.host_id, "p2");
        assert_eq!(room.players.len(), 1);
        assert!(room.active);
    }

    #[test]
    fn test_leave_last_player_deactivates() {
        let room = lobby();
        let room = leave(room, "h1");
        assert!(room.players.is_empty());
        assert!(!room.active);
    }

    #[test]
    fn test_leave_non_host_keeps_host() {
        let room = two_player_room();
        let room = leave(room, "p2");
        assert_eq!(room.host_id, "h1");
        assert_eq!(room.players.len(), 1);
        assert!(room.active);
    }

    #[test]
    fn test_full_host_handoff_scenario() {
        // Create → Join → host leaves → last player leaves
        let room = lobby();
        assert_eq!(room.code.len(), 6);
        let room = join(room, "p2", "bob").unwrap();
        assert_eq!(room.players.len(), 2);

        let room = leave(room, "h1");
        assert_eq!(room.host_id, "p2");
        assert!(room.active);

        let room = leave(room, "p2");
        assert!(room.players.is_empty());
        assert!(!room.active);
    }

    #[test]
    fn test_cancel_requires_host() {
        let room = two_player_room();
        let err = cancel(room.clone(), "p2").unwrap_err();
        assert!(matches!(err, DuelError::NotHost(_)));

        let room = cancel(room, "h1").unwrap();
        assert!(!room.active);
        assert_eq!(room.players.len(), 2);
    }

    #[test]
    fn test_start_requires_host_and_resets_completion() {
        let room = two_player_room();
        assert!(matches!(
            start(room.clone(), "p2"),
            Err(DuelError::NotHost(_))
        ));

        let room = start(room, "h1").unwrap();
        assert!(room.started);
        for player in &room.players {
            assert_eq!(player.completed, Some(false));
            assert!(player.completed_at.is_none());
        }
    }

    #[test]
    fn test_start_closed_room_rejected() {
        let room = two_player_room();
        let room = cancel(room, "h1").unwrap();

        let err = start(room.clone(), "h1").unwrap_err();
        assert!(matches!(err, DuelError::RoomClosed(_)));
        // the failed start left the document alone
        assert!(!room.started);
        assert!(!room.active);
    }

    #[test]
    fn test_completion_before_start_is_noop() {
        let room = two_player_room();
        let outcome = record_completion(room, "p2", Utc::now());
        assert!(!outcome.changed);
        assert!(!outcome.room.game_completed);
        assert!(outcome.room.players.iter().all(|p| !p.is_completed()));
    }

    #[test]
    fn test_completion_of_all_players_closes_room() {
        let room = start(two_player_room(), "h1").unwrap();

        let outcome = record_completion(room, "h1", Utc::now());
        assert!(outcome.changed);
        let room = outcome.room;
        assert!(room.players[0].is_completed());
        assert!(!room.players[1].is_completed());
        assert!(!room.game_completed);
        assert!(room.active);

        let outcome = record_completion(room, "p2", Utc::now());
        assert!(outcome.changed);
        let room = outcome.room;
        assert!(room.game_completed);
        assert!(!room.active);
    }

    #[test]
    fn test_completion_is_idempotent() {
        let room = start(two_player_room(), "h1").unwrap();

        let first = record_completion(room, "h1", Utc::now());
        let stamp = first.room.players[0].completed_at;
        assert!(stamp.is_some());

        let second = record_completion(first.room, "h1", Utc::now());
        assert!(!second.changed);
        assert_eq!(second.room.players[0].completed_at, stamp);
    }

    #[test]
    fn test_game_completed_implies_inactive() {
        let room = start(two_player_room(), "h1").unwrap();
        let room = record_completion(room, "h1", Utc::now()).room;
        let room = record_completion(room, "p2", Utc::now()).room;
        assert!(room.game_completed);
        assert!(!room.active);
    }

    #[test]
    fn test_join_leave_sequences_keep_players_unique_and_ordered() {
        let mut room = lobby();
        for (id, name) in [("p2", "b"), ("p3", "c"), ("p2", "b"), ("p4", "d")] {
            room = join(room, id, name).unwrap();
        }
        room = leave(room, "p3");
        room = join(room, "p5", "e").unwrap();

        let ids: Vec<&str> = room.players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "p2", "p4", "p5"]);

        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids, deduped);
    }
}
