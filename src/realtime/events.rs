use serde::{Deserialize, Serialize};

use crate::room::Room;

/// Events a client may send over the realtime channel.
///
/// Subscription is driven by explicit client intent and is independent of
/// the HTTP room actions: subscribing to a code does not make the caller a
/// member of the room, it only registers interest in its snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Subscribe {
        #[serde(rename = "roomCode")]
        room_code: String,
        /// Optional identity, only consulted when disconnect cleanup is
        /// enabled in config
        #[serde(rename = "playerId", default, skip_serializing_if = "Option::is_none")]
        player_id: Option<String>,
    },
    Unsubscribe {
        #[serde(rename = "roomCode")]
        room_code: String,
    },
}

/// Events pushed from the server to subscribed connections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    RoomUpdate { room: Room },
    Error { message: String },
}
