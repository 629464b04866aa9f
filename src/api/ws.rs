use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use super::routes::SharedService;
use crate::realtime::ClientEvent;

/// Per-connection event loop for the realtime channel.
///
/// The socket is split so a spawned task drains the outbound mpsc queue
/// while this task reads client events. Room membership is not touched on
/// disconnect unless disconnect cleanup is enabled and the client
/// identified itself when subscribing.
pub async fn handle_connection(
    websocket: WebSocket,
    service: SharedService,
    disconnect_cleanup: bool,
) {
    tracing::info!("New realtime connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let gateway = service.gateway().clone();
    let conn_id = gateway.register(tx).await;

    // Spawn task to send messages to client
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => handle_client_message(&service, conn_id, message).await,
            Err(e) => {
                tracing::error!(error = %e, conn_id, "WebSocket error");
                break;
            }
        }
    }

    if let Some(report) = gateway.unregister(conn_id).await {
        if disconnect_cleanup {
            if let Some(player_id) = report.player_id {
                for code in report.codes {
                    if let Err(e) = service.leave_room(&code, &player_id).await {
                        tracing::warn!(
                            error = %e,
                            room_code = %code,
                            player_id = %player_id,
                            "Disconnect cleanup failed"
                        );
                    }
                }
            }
        }
    }

    sender_task.abort();
    tracing::info!(conn_id, "Realtime connection closed");
}

async fn handle_client_message(service: &SharedService, conn_id: u64, message: Message) {
    let Ok(text) = message.to_str() else {
        // Ping/pong/binary frames are not part of the protocol
        return;
    };
    tracing::debug!(conn_id, "Received realtime event: {}", text);

    let gateway = service.gateway();
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::Subscribe {
            room_code,
            player_id,
        }) => {
            gateway.subscribe(conn_id, &room_code, player_id).await;

            // Immediate state sync so a late subscriber is not stuck
            // waiting for the next mutation
            match service.snapshot(&room_code).await {
                Ok(Some(room)) => gateway.send_snapshot(conn_id, &room).await,
                Ok(None) => {
                    gateway
                        .send_error(conn_id, format!("Room {room_code} not found"))
                        .await
                }
                Err(e) => {
                    tracing::error!(error = %e, room_code = %room_code, "Snapshot read failed");
                }
            }
        }
        Ok(ClientEvent::Unsubscribe { room_code }) => {
            gateway.unsubscribe(conn_id, &room_code).await;
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                raw_message = %text,
                "Failed to parse realtime event"
            );
            gateway.send_error(conn_id, "Unrecognized event").await;
        }
    }
}
