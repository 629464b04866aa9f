mod api;
mod config;
mod error;
mod exec;
mod problems;
mod realtime;
mod room;

use std::sync::Arc;

use config::Config;
use exec::CodeEvaluator;
use problems::SeededCatalog;
use realtime::RealtimeGateway;
use room::{InMemoryRoomStore, RoomService};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("codeduel_server=info,warp=info")),
        )
        .init();

    let bind_address = config.bind_address();
    let disconnect_cleanup = config.realtime.disconnect_cleanup;

    let gateway = Arc::new(RealtimeGateway::new());
    let service = Arc::new(RoomService::new(InMemoryRoomStore::new(), gateway));
    let catalog = Arc::new(SeededCatalog::new());
    let evaluator = Arc::new(CodeEvaluator::new(config.evaluator));

    if !evaluator.check_sandbox().await {
        tracing::warn!("Code execution requests will fail until the sandbox container is up");
    }

    let routes = api::routes::routes(service, catalog, evaluator, disconnect_cleanup);

    tracing::info!(port = bind_address.1, "Starting CodeDuel server");
    warp::serve(routes).run(bind_address).await;
}
