// Integration tests for the CodeDuel server
// These verify end-to-end functionality over real HTTP and WebSocket connections

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const HTTP_BASE: &str = "http://127.0.0.1:8080";
const WS_URL: &str = "ws://127.0.0.1:8080/ws";

async fn create_room(client: &reqwest::Client, host_id: &str) -> String {
    let resp = client
        .post(format!("{HTTP_BASE}/api/rooms/create"))
        .json(&json!({
            "problemId": "prob-integration",
            "hostUserId": host_id,
            "hostName": host_id
        }))
        .send()
        .await
        .expect("create room request failed");
    assert_eq!(resp.status(), 200);

    let room: serde_json::Value = resp.json().await.unwrap();
    room["code"].as_str().unwrap().to_string()
}

/// Test HTTP health check endpoint
#[tokio::test]
#[ignore] // Requires running server
async fn test_health_endpoint() {
    let client = reqwest::Client::new();

    match client.get(format!("{HTTP_BASE}/health")).send().await {
        Ok(resp) => {
            assert_eq!(resp.status(), 200, "Health endpoint should return 200 OK");

            let body: serde_json::Value = resp.json().await.unwrap();
            assert_eq!(body["status"], "healthy");
            assert_eq!(body["service"], "CodeDuel Server");
        }
        Err(e) => {
            eprintln!("Server not running: {}. Start server with 'cargo run' before running integration tests.", e);
            panic!("Cannot connect to server");
        }
    }
}

/// Test the full room lifecycle over HTTP
#[tokio::test]
#[ignore] // Requires running server
async fn test_room_lifecycle_flow() {
    let client = reqwest::Client::new();
    let code = create_room(&client, "it_host_1").await;
    assert_eq!(code.len(), 6, "Room code should be 6 characters");

    // Second player joins
    let resp = client
        .post(format!("{HTTP_BASE}/api/rooms/join"))
        .json(&json!({
            "roomCode": code,
            "userId": "it_player_1",
            "username": "Player One"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let room: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(room["players"].as_array().unwrap().len(), 2);

    // Host leaves: host role moves to the remaining player
    let resp = client
        .post(format!("{HTTP_BASE}/api/rooms/leave"))
        .json(&json!({"roomCode": code, "userId": "it_host_1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{HTTP_BASE}/api/rooms/user/it_player_1"))
        .send()
        .await
        .unwrap();
    let room: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(room["hostId"], "it_player_1");
}

/// Test that non-host actions are rejected
#[tokio::test]
#[ignore] // Requires running server
async fn test_host_privilege_enforcement() {
    let client = reqwest::Client::new();
    let code = create_room(&client, "it_host_2").await;

    let resp = client
        .post(format!("{HTTP_BASE}/api/rooms/cancel"))
        .json(&json!({"roomCode": code, "hostUserId": "it_not_host"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403, "Non-host cancel should be forbidden");

    let resp = client
        .post(format!("{HTTP_BASE}/api/rooms/start"))
        .json(&json!({"roomCode": code, "hostUserId": "it_not_host"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403, "Non-host start should be forbidden");
}

/// Test joining a nonexistent room
#[tokio::test]
#[ignore] // Requires running server
async fn test_join_unknown_room() {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{HTTP_BASE}/api/rooms/join"))
        .json(&json!({
            "roomCode": "ZZZZZZ",
            "userId": "it_player_x",
            "username": "X"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

/// Test that a subscriber receives the snapshot on subscribe and the
/// pushed update when the room changes
#[tokio::test]
#[ignore] // Requires running server
async fn test_realtime_subscribe_and_push() {
    let client = reqwest::Client::new();
    let code = create_room(&client, "it_host_3").await;

    let (ws_stream, _) = connect_async(WS_URL).await.expect("Failed to connect");
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(
            json!({"type": "subscribe", "roomCode": code}).to_string(),
        ))
        .await
        .expect("Failed to send subscribe");

    // Immediate state sync frame
    let timeout = sleep(Duration::from_secs(2));
    tokio::pin!(timeout);
    tokio::select! {
        msg = read.next() => {
            let text = match msg {
                Some(Ok(Message::Text(text))) => text,
                other => panic!("Expected snapshot frame, got {:?}", other),
            };
            let event: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(event["type"], "room_update");
            assert_eq!(event["room"]["code"], code.as_str());
            assert_eq!(event["room"]["players"].as_array().unwrap().len(), 1);
        }
        _ = &mut timeout => panic!("Timeout waiting for subscribe snapshot"),
    }

    // A join should push a fresh snapshot
    client
        .post(format!("{HTTP_BASE}/api/rooms/join"))
        .json(&json!({
            "roomCode": code,
            "userId": "it_player_3",
            "username": "Player Three"
        }))
        .send()
        .await
        .unwrap();

    let timeout = sleep(Duration::from_secs(2));
    tokio::pin!(timeout);
    tokio::select! {
        msg = read.next() => {
            let text = match msg {
                Some(Ok(Message::Text(text))) => text,
                other => panic!("Expected update frame, got {:?}", other),
            };
            let event: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(event["type"], "room_update");
            assert_eq!(event["room"]["players"].as_array().unwrap().len(), 2);
        }
        _ = &mut timeout => panic!("Timeout waiting for pushed room update"),
    }
}

/// Test subscribing to an unknown room code
#[tokio::test]
#[ignore] // Requires running server
async fn test_subscribe_unknown_room() {
    let (ws_stream, _) = connect_async(WS_URL).await.expect("Failed to connect");
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(
            json!({"type": "subscribe", "roomCode": "ZZZZZZ"}).to_string(),
        ))
        .await
        .unwrap();

    let timeout = sleep(Duration::from_secs(2));
    tokio::pin!(timeout);
    tokio::select! {
        msg = read.next() => {
            if let Some(Ok(Message::Text(text))) = msg {
                let event: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(event["type"], "error");
            }
        }
        _ = &mut timeout => panic!("Timeout waiting for error event"),
    }
}

/// Test that a submission stuck in an infinite loop comes back as a
/// timeout verdict instead of hanging the request
#[tokio::test]
#[ignore] // Requires running server and the sandbox container
async fn test_code_execution_timeout() {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{HTTP_BASE}/api/code/run"))
        .timeout(Duration::from_secs(30))
        .json(&json!({
            "code": "def two_sum(nums, target):\n    while True:\n        pass",
            "problem_title": "Two Sum",
            "user_id": "it_looper"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let verdict: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(verdict["status"], "error");
    assert!(verdict["message"].as_str().unwrap().contains("timed out"));
}

/// Test the problem catalog routes
#[tokio::test]
#[ignore] // Requires running server
async fn test_problem_catalog() {
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{HTTP_BASE}/api/problems"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let listing: serde_json::Value = resp.json().await.unwrap();
    assert!(!listing.as_array().unwrap().is_empty());

    let resp = client
        .get(format!("{HTTP_BASE}/api/problems/title/Two%20Sum"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let problem: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(problem["title"], "Two Sum");
}
