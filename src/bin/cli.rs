// CodeDuel Server CLI Validation Tool
// Exercises the room HTTP actions and the realtime channel against a live server

use clap::{Parser, Subcommand};
use colored::*;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "codeduel-cli")]
#[command(about = "CodeDuel Server CLI Validation Tool", long_about = None)]
struct Cli {
    /// Server host:port
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// List the problem catalog
    Problems,

    /// Create a room and print its code
    CreateRoom {
        /// Problem id for the duel
        #[arg(short, long)]
        problem_id: String,

        /// Host user id
        #[arg(short, long)]
        user_id: String,

        /// Host display name
        #[arg(short, long)]
        name: String,
    },

    /// Join an existing room
    JoinRoom {
        /// Room code to join
        #[arg(short, long)]
        code: String,

        /// Player user id
        #[arg(short, long)]
        user_id: String,

        /// Player display name
        #[arg(short, long)]
        name: String,
    },

    /// Leave a room
    LeaveRoom {
        #[arg(short, long)]
        code: String,

        #[arg(short, long)]
        user_id: String,
    },

    /// Cancel a room (host only)
    CancelRoom {
        #[arg(short, long)]
        code: String,

        #[arg(short, long)]
        user_id: String,
    },

    /// Start the game (host only)
    StartRoom {
        #[arg(short, long)]
        code: String,

        #[arg(short, long)]
        user_id: String,
    },

    /// Subscribe to a room's channel and print pushed snapshots
    Watch {
        #[arg(short, long)]
        code: String,

        /// Identify as this player (enables disconnect cleanup server-side)
        #[arg(short, long)]
        user_id: Option<String>,
    },

    /// End-to-end smoke test: create, join, start, watch
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => check_health(&cli.server).await,
        Commands::Problems => list_problems(&cli.server).await,
        Commands::CreateRoom {
            problem_id,
            user_id,
            name,
        } => {
            create_room(&cli.server, problem_id, user_id, name).await;
        }
        Commands::JoinRoom {
            code,
            user_id,
            name,
        } => join_room(&cli.server, code, user_id, name).await,
        Commands::LeaveRoom { code, user_id } => {
            room_action(&cli.server, "leave", code, "userId", user_id).await
        }
        Commands::CancelRoom { code, user_id } => {
            room_action(&cli.server, "cancel", code, "hostUserId", user_id).await
        }
        Commands::StartRoom { code, user_id } => {
            room_action(&cli.server, "start", code, "hostUserId", user_id).await
        }
        Commands::Watch { code, user_id } => watch_room(&cli.server, code, user_id.as_deref()).await,
        Commands::Validate => validate(&cli.server).await,
    }
}

async fn check_health(server: &str) {
    let url = format!("http://{}/health", server);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            println!("{} {}", "Server healthy:".green(), body);
        }
        Ok(resp) => println!("{} status {}", "Unexpected response:".yellow(), resp.status()),
        Err(e) => println!("{} {}", "Cannot reach server:".red(), e),
    }
}

async fn list_problems(server: &str) {
    let url = format!("http://{}/api/problems", server);
    match reqwest::get(&url).await {
        Ok(resp) => {
            let problems: serde_json::Value = resp.json().await.unwrap_or_default();
            if let Some(list) = problems.as_array() {
                for p in list {
                    println!(
                        "{} [{}] {}",
                        p["id"].as_str().unwrap_or("?").dimmed(),
                        p["difficulty"].as_str().unwrap_or("?").yellow(),
                        p["title"].as_str().unwrap_or("?").bold()
                    );
                }
            }
        }
        Err(e) => println!("{} {}", "Request failed:".red(), e),
    }
}

async fn create_room(server: &str, problem_id: &str, user_id: &str, name: &str) -> Option<String> {
    let url = format!("http://{}/api/rooms/create", server);
    let body = json!({
        "problemId": problem_id,
        "hostUserId": user_id,
        "hostName": name
    });

    match reqwest::Client::new().post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => {
            let room: serde_json::Value = resp.json().await.ok()?;
            let code = room["code"].as_str()?.to_string();
            println!("{} {}", "Room created:".green(), code.bold());
            Some(code)
        }
        Ok(resp) => {
            println!("{} {}", "Create failed:".red(), resp.status());
            None
        }
        Err(e) => {
            println!("{} {}", "Request failed:".red(), e);
            None
        }
    }
}

async fn join_room(server: &str, code: &str, user_id: &str, name: &str) {
    let url = format!("http://{}/api/rooms/join", server);
    let body = json!({
        "roomCode": code,
        "userId": user_id,
        "username": name
    });

    match reqwest::Client::new().post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => {
            let room: serde_json::Value = resp.json().await.unwrap_or_default();
            let players = room["players"].as_array().map(|p| p.len()).unwrap_or(0);
            println!(
                "{} {} ({} players)",
                "Joined room".green(),
                code.bold(),
                players
            );
        }
        Ok(resp) => {
            let status = resp.status();
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            println!(
                "{} {} {}",
                "Join failed:".red(),
                status,
                body["error"].as_str().unwrap_or("")
            );
        }
        Err(e) => println!("{} {}", "Request failed:".red(), e),
    }
}

async fn room_action(server: &str, action: &str, code: &str, actor_field: &str, user_id: &str) {
    let url = format!("http://{}/api/rooms/{}", server, action);
    let body = json!({
        "roomCode": code,
        actor_field: user_id
    });

    match reqwest::Client::new().post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => {
            let reply: serde_json::Value = resp.json().await.unwrap_or_default();
            println!(
                "{} {}",
                "OK:".green(),
                reply["message"].as_str().unwrap_or("done")
            );
        }
        Ok(resp) => {
            let status = resp.status();
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            println!(
                "{} {} {}",
                format!("{} failed:", action).red(),
                status,
                body["error"].as_str().unwrap_or("")
            );
        }
        Err(e) => println!("{} {}", "Request failed:".red(), e),
    }
}

async fn watch_room(server: &str, code: &str, user_id: Option<&str>) {
    let url = format!("ws://{}/ws", server);
    let (ws_stream, _) = match connect_async(url.as_str()).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} {}", "Cannot connect:".red(), e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let mut subscribe = json!({
        "type": "subscribe",
        "roomCode": code
    });
    if let Some(id) = user_id {
        subscribe["playerId"] = json!(id);
    }

    if write
        .send(Message::Text(subscribe.to_string()))
        .await
        .is_err()
    {
        println!("{}", "Failed to subscribe".red());
        return;
    }

    println!(
        "{} {} {}",
        "Watching room".cyan(),
        code.bold(),
        "(Ctrl+C to stop)".dimmed()
    );

    while let Some(Ok(message)) = read.next().await {
        if let Message::Text(text) = message {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(event) if event["type"] == "room_update" => {
                    let room = &event["room"];
                    let players: Vec<String> = room["players"]
                        .as_array()
                        .map(|list| {
                            list.iter()
                                .map(|p| {
                                    let name = p["name"].as_str().unwrap_or("?");
                                    if p["completed"] == json!(true) {
                                        format!("{} ✓", name)
                                    } else {
                                        name.to_string()
                                    }
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    println!(
                        "{} active={} started={} completed={} players=[{}]",
                        "room_update".green(),
                        room["active"],
                        room["started"],
                        room["gameCompleted"],
                        players.join(", ")
                    );
                }
                Ok(event) if event["type"] == "error" => {
                    println!("{} {}", "error".red(), event["message"]);
                }
                _ => println!("{} {}", "event".dimmed(), text),
            }
        }
    }
}

async fn validate(server: &str) {
    println!("{}", "Running end-to-end validation".cyan().bold());

    check_health(server).await;

    let Some(code) = create_room(server, "validation-problem", "cli_host", "CLI Host").await else {
        println!("{}", "Validation aborted: room creation failed".red());
        return;
    };

    join_room(server, &code, "cli_player", "CLI Player").await;
    sleep(Duration::from_millis(100)).await;
    room_action(server, "start", &code, "hostUserId", "cli_host").await;
    room_action(server, "cancel", &code, "hostUserId", "cli_host").await;

    println!("{}", "Validation flow complete".green().bold());
}
