use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};
use warp::ws::Message;

use super::events::ServerEvent;
use crate::room::Room;

/// Handle identifying one websocket connection
pub type ConnId = u64;

struct ConnectionEntry {
    sender: mpsc::UnboundedSender<Message>,
    codes: HashSet<String>,
    /// Set when the client identified itself at subscribe time
    player_id: Option<String>,
}

/// What a connection was holding when it went away, so the caller can run
/// optional disconnect cleanup
pub struct DisconnectReport {
    pub codes: Vec<String>,
    pub player_id: Option<String>,
}

/// Owns the connection-to-channel registry and pushes room snapshots.
///
/// Lifecycle is explicit: `subscribe`/`unsubscribe` add and remove channel
/// membership, `unregister` drops the connection entirely. Disconnection
/// never mutates room membership here; the returned [`DisconnectReport`]
/// lets the socket layer drive leave actions when that capability is
/// enabled in config.
///
/// Broadcast ordering: for a single code, snapshots go out in the order
/// `broadcast` is called. Within one room action the service awaits the
/// store write before broadcasting, but concurrent actions on the same
/// code can interleave their write and broadcast steps, so a stale
/// snapshot may follow a newer one — the same known gap as the store's
/// last-write-wins update. No ordering holds across different codes.
pub struct RealtimeGateway {
    next_conn_id: AtomicU64,
    connections: RwLock<HashMap<ConnId, ConnectionEntry>>,
    channels: RwLock<HashMap<String, HashSet<ConnId>>>,
}

impl RealtimeGateway {
    pub fn new() -> Self {
        Self {
            next_conn_id: AtomicU64::new(1),
            connections: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection's outbound sender, returning its handle
    pub async fn register(&self, sender: mpsc::UnboundedSender<Message>) -> ConnId {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let mut connections = self.connections.write().await;
        connections.insert(
            conn_id,
            ConnectionEntry {
                sender,
                codes: HashSet::new(),
                player_id: None,
            },
        );
        tracing::debug!(conn_id, "Realtime connection registered");
        conn_id
    }

    /// Add the connection to the channel for `code`.
    ///
    /// The connections lock is held across the channel insert so a
    /// concurrent `unregister` either sees the membership and sweeps it,
    /// or removes the entry first and this call backs out.
    pub async fn subscribe(&self, conn_id: ConnId, code: &str, player_id: Option<String>) {
        let mut connections = self.connections.write().await;
        let Some(entry) = connections.get_mut(&conn_id) else {
            return;
        };
        entry.codes.insert(code.to_string());
        if player_id.is_some() {
            entry.player_id = player_id;
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(code.to_string())
            .or_default()
            .insert(conn_id);
        drop(channels);
        drop(connections);

        tracing::info!(conn_id, room_code = %code, "Subscribed to room channel");
    }

    pub async fn unsubscribe(&self, conn_id: ConnId, code: &str) {
        let mut connections = self.connections.write().await;
        if let Some(entry) = connections.get_mut(&conn_id) {
            entry.codes.remove(code);
        }
        drop(connections);

        let mut channels = self.channels.write().await;
        if let Some(members) = channels.get_mut(code) {
            members.remove(&conn_id);
            if members.is_empty() {
                channels.remove(code);
            }
        }

        tracing::info!(conn_id, room_code = %code, "Unsubscribed from room channel");
    }

    /// Drop the connection from the registry and every channel it joined
    pub async fn unregister(&self, conn_id: ConnId) -> Option<DisconnectReport> {
        let mut connections = self.connections.write().await;
        let entry = connections.remove(&conn_id)?;
        drop(connections);

        let mut channels = self.channels.write().await;
        for code in &entry.codes {
            if let Some(members) = channels.get_mut(code) {
                members.remove(&conn_id);
                if members.is_empty() {
                    channels.remove(code);
                }
            }
        }

        tracing::debug!(conn_id, "Realtime connection unregistered");
        Some(DisconnectReport {
            codes: entry.codes.into_iter().collect(),
            player_id: entry.player_id,
        })
    }

    /// Push the latest room snapshot to every subscriber of its code
    pub async fn broadcast(&self, room: &Room) {
        let message = match room_update_message(room) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, room_code = %room.code, "Failed to serialize room snapshot");
                return;
            }
        };

        let channels = self.channels.read().await;
        let Some(members) = channels.get(&room.code) else {
            return;
        };
        let members: Vec<ConnId> = members.iter().copied().collect();
        drop(channels);

        let connections = self.connections.read().await;
        let mut delivered = 0usize;
        for conn_id in members {
            if let Some(entry) = connections.get(&conn_id) {
                // A closed receiver just means the connection is mid-teardown
                if entry.sender.send(message.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        tracing::debug!(room_code = %room.code, delivered, "Broadcast room snapshot");
    }

    /// Send the current snapshot to a single connection, used for the
    /// state sync on subscribe
    pub async fn send_snapshot(&self, conn_id: ConnId, room: &Room) {
        let Ok(message) = room_update_message(room) else {
            return;
        };
        let connections = self.connections.read().await;
        if let Some(entry) = connections.get(&conn_id) {
            let _ = entry.sender.send(message);
        }
    }

    /// Send an error event to a single connection
    pub async fn send_error(&self, conn_id: ConnId, message: impl Into<String>) {
        let event = ServerEvent::Error {
            message: message.into(),
        };
        let Ok(text) = serde_json::to_string(&event) else {
            return;
        };
        let connections = self.connections.read().await;
        if let Some(entry) = connections.get(&conn_id) {
            let _ = entry.sender.send(Message::text(text));
        }
    }

    /// Number of connections currently subscribed to `code`
    pub async fn channel_size(&self, code: &str) -> usize {
        let channels = self.channels.read().await;
        channels.get(code).map(|m| m.len()).unwrap_or(0)
    }
}

impl Default for RealtimeGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn room_update_message(room: &Room) -> serde_json::Result<Message> {
    let event = ServerEvent::RoomUpdate { room: room.clone() };
    Ok(Message::text(serde_json::to_string(&event)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::model::generate_room_code;

    fn test_room() -> Room {
        Room::new_lobby(generate_room_code(), "prob-1", "h1", "host")
    }

    async fn connect(gateway: &RealtimeGateway) -> (ConnId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = gateway.register(tx).await;
        (conn_id, rx)
    }

    fn room_code_of(message: &Message) -> String {
        let value: serde_json::Value = serde_json::from_str(message.to_str().unwrap()).unwrap();
        assert_eq!(value["type"], "room_update");
        value["room"]["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let gateway = RealtimeGateway::new();
        let room = test_room();

        let (a, mut rx_a) = connect(&gateway).await;
        let (b, mut rx_b) = connect(&gateway).await;
        gateway.subscribe(a, &room.code, None).await;
        gateway.subscribe(b, &room.code, None).await;

        gateway.broadcast(&room).await;

        assert_eq!(room_code_of(&rx_a.recv().await.unwrap()), room.code);
        assert_eq!(room_code_of(&rx_b.recv().await.unwrap()), room.code);
    }

    #[tokio::test]
    async fn test_broadcast_skips_other_channels() {
        let gateway = RealtimeGateway::new();
        let room = test_room();
        let other = test_room();

        let (a, mut rx_a) = connect(&gateway).await;
        gateway.subscribe(a, &other.code, None).await;

        gateway.broadcast(&room).await;
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let gateway = RealtimeGateway::new();
        let room = test_room();

        let (a, mut rx_a) = connect(&gateway).await;
        gateway.subscribe(a, &room.code, None).await;
        gateway.unsubscribe(a, &room.code).await;

        gateway.broadcast(&room).await;
        assert!(rx_a.try_recv().is_err());
        assert_eq!(gateway.channel_size(&room.code).await, 0);
    }

    #[tokio::test]
    async fn test_unregister_reports_subscriptions_and_identity() {
        let gateway = RealtimeGateway::new();
        let room = test_room();

        let (a, _rx_a) = connect(&gateway).await;
        gateway.subscribe(a, &room.code, Some("u1".to_string())).await;

        let report = gateway.unregister(a).await.unwrap();
        assert_eq!(report.codes, vec![room.code.clone()]);
        assert_eq!(report.player_id.as_deref(), Some("u1"));
        assert_eq!(gateway.channel_size(&room.code).await, 0);
    }

    #[tokio::test]
    async fn test_snapshot_goes_to_caller_only() {
        let gateway = RealtimeGateway::new();
        let room = test_room();

        let (a, mut rx_a) = connect(&gateway).await;
        let (b, mut rx_b) = connect(&gateway).await;
        gateway.subscribe(a, &room.code, None).await;
        gateway.subscribe(b, &room.code, None).await;

        gateway.send_snapshot(a, &room).await;
        assert_eq!(room_code_of(&rx_a.recv().await.unwrap()), room.code);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_subscribe_and_unregister_leaves_no_stale_member() {
        use std::sync::Arc;

        let gateway = Arc::new(RealtimeGateway::new());
        let code = generate_room_code();

        for _ in 0..100 {
            let (tx, _rx) = mpsc::unbounded_channel();
            let conn_id = gateway.register(tx).await;

            let sub = {
                let gateway = Arc::clone(&gateway);
                let code = code.clone();
                tokio::spawn(async move {
                    gateway.subscribe(conn_id, &code, None).await;
                })
            };
            let unreg = {
                let gateway = Arc::clone(&gateway);
                tokio::spawn(async move {
                    gateway.unregister(conn_id).await;
                })
            };
            sub.await.unwrap();
            unreg.await.unwrap();

            // Either the subscribe backed out or the unregister swept the
            // membership; nothing may linger in the channel
            assert_eq!(gateway.channel_size(&code).await, 0);
        }
    }

    #[tokio::test]
    async fn test_broadcast_order_preserved_per_code() {
        let gateway = RealtimeGateway::new();
        let mut room = test_room();

        let (a, mut rx_a) = connect(&gateway).await;
        gateway.subscribe(a, &room.code, None).await;

        gateway.broadcast(&room).await;
        room.started = true;
        gateway.broadcast(&room).await;

        let first: serde_json::Value =
            serde_json::from_str(rx_a.recv().await.unwrap().to_str().unwrap()).unwrap();
        let second: serde_json::Value =
            serde_json::from_str(rx_a.recv().await.unwrap().to_str().unwrap()).unwrap();
        assert_eq!(first["room"]["started"], false);
        assert_eq!(second["room"]["started"], true);
    }
}
