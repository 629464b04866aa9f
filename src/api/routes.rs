use std::convert::Infallible;
use std::sync::Arc;

use serde::Deserialize;
use warp::{Filter, Rejection, Reply};

use super::ws;
use crate::error::{handle_rejection, DuelError};
use crate::exec::{CodeEvaluator, ExecutionRequest};
use crate::problems::{ProblemCatalog, SeededCatalog};
use crate::room::{InMemoryRoomStore, RoomService};

pub type SharedService = Arc<RoomService<InMemoryRoomStore>>;
pub type SharedCatalog = Arc<SeededCatalog>;
pub type SharedEvaluator = Arc<CodeEvaluator>;

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    #[serde(rename = "problemId")]
    problem_id: String,
    #[serde(rename = "hostUserId")]
    host_user_id: String,
    #[serde(rename = "hostName")]
    host_name: String,
}

#[derive(Debug, Deserialize)]
struct JoinRoomRequest {
    #[serde(rename = "roomCode")]
    room_code: String,
    #[serde(rename = "userId")]
    user_id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct LeaveRoomRequest {
    #[serde(rename = "roomCode")]
    room_code: String,
    #[serde(rename = "userId")]
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct HostActionRequest {
    #[serde(rename = "roomCode")]
    room_code: String,
    #[serde(rename = "hostUserId")]
    host_user_id: String,
}

/// Full route tree: room actions, problem catalog, code execution,
/// realtime websocket and health check.
pub fn routes(
    service: SharedService,
    catalog: SharedCatalog,
    evaluator: SharedEvaluator,
    disconnect_cleanup: bool,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    room_routes(service.clone())
        .or(problem_routes(catalog.clone()))
        .or(code_routes(service.clone(), catalog, evaluator))
        .or(websocket_route(service, disconnect_cleanup))
        .or(health_check())
        .recover(handle_rejection)
}

fn room_routes(
    service: SharedService,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let base = warp::path("api").and(warp::path("rooms"));

    let create = base
        .and(warp::path("create"))
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(service.clone()))
        .and_then(handle_create_room);

    let join = base
        .and(warp::path("join"))
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(service.clone()))
        .and_then(handle_join_room);

    let leave = base
        .and(warp::path("leave"))
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(service.clone()))
        .and_then(handle_leave_room);

    let cancel = base
        .and(warp::path("cancel"))
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(service.clone()))
        .and_then(handle_cancel_room);

    let start = base
        .and(warp::path("start"))
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(service.clone()))
        .and_then(handle_start_room);

    let user_room = base
        .and(warp::path("user"))
        .and(warp::path::param::<String>())
        .and(warp::get())
        .and(with_state(service))
        .and_then(handle_user_room);

    create.or(join).or(leave).or(cancel).or(start).or(user_room)
}

fn problem_routes(
    catalog: SharedCatalog,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let base = warp::path("api").and(warp::path("problems"));

    let list = base
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(catalog.clone()))
        .and_then(handle_list_problems);

    let by_title = base
        .and(warp::path("title"))
        .and(warp::path::param::<String>())
        .and(warp::get())
        .and(with_state(catalog.clone()))
        .and_then(handle_problem_by_title);

    let by_id = base
        .and(warp::path("id"))
        .and(warp::path::param::<String>())
        .and(warp::get())
        .and(with_state(catalog))
        .and_then(handle_problem_by_id);

    list.or(by_title).or(by_id)
}

fn code_routes(
    service: SharedService,
    catalog: SharedCatalog,
    evaluator: SharedEvaluator,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("api")
        .and(warp::path("code"))
        .and(warp::path("run"))
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(service))
        .and(with_state(catalog))
        .and(with_state(evaluator))
        .and_then(handle_run_code)
}

fn websocket_route(
    service: SharedService,
    disconnect_cleanup: bool,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("ws")
        .and(warp::ws())
        .and(with_state(service))
        .map(move |upgrade: warp::ws::Ws, service: SharedService| {
            upgrade.on_upgrade(move |websocket| {
                ws::handle_connection(websocket, service, disconnect_cleanup)
            })
        })
}

pub fn health_check() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("health").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "healthy",
            "service": "CodeDuel Server",
            "version": "1.0.0"
        }))
    })
}

fn with_state<T: Clone + Send>(
    state: T,
) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn handle_create_room(
    body: CreateRoomRequest,
    service: SharedService,
) -> Result<impl Reply, Rejection> {
    let room = service
        .create_room(&body.problem_id, &body.host_user_id, &body.host_name)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&room))
}

async fn handle_join_room(
    body: JoinRoomRequest,
    service: SharedService,
) -> Result<impl Reply, Rejection> {
    let room = service
        .join_room(&body.room_code, &body.user_id, &body.username)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&room))
}

async fn handle_leave_room(
    body: LeaveRoomRequest,
    service: SharedService,
) -> Result<impl Reply, Rejection> {
    service
        .leave_room(&body.room_code, &body.user_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(
        &serde_json::json!({"message": "Left room"}),
    ))
}

async fn handle_cancel_room(
    body: HostActionRequest,
    service: SharedService,
) -> Result<impl Reply, Rejection> {
    service
        .cancel_room(&body.room_code, &body.host_user_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(
        &serde_json::json!({"message": "Room canceled"}),
    ))
}

async fn handle_start_room(
    body: HostActionRequest,
    service: SharedService,
) -> Result<impl Reply, Rejection> {
    let room = service
        .start_room(&body.room_code, &body.host_user_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&serde_json::json!({
        "message": "Game started",
        "room": room
    })))
}

async fn handle_user_room(
    user_id: String,
    service: SharedService,
) -> Result<impl Reply, Rejection> {
    let room = service
        .find_room_for_player(&user_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&room))
}

async fn handle_list_problems(catalog: SharedCatalog) -> Result<impl Reply, Rejection> {
    let problems = catalog.list().await.map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&problems))
}

async fn handle_problem_by_title(
    title: String,
    catalog: SharedCatalog,
) -> Result<impl Reply, Rejection> {
    // Path segments arrive percent-encoded ("Two%20Sum")
    let title = urlencoding::decode(&title)
        .map(|s| s.into_owned())
        .unwrap_or(title);
    let problem = catalog
        .find_by_title(&title)
        .await
        .map_err(warp::reject::custom)?
        .ok_or_else(|| warp::reject::custom(DuelError::ProblemNotFound(title)))?;
    Ok(warp::reply::json(&problem))
}

async fn handle_problem_by_id(
    id: String,
    catalog: SharedCatalog,
) -> Result<impl Reply, Rejection> {
    let problem = catalog
        .find_by_id(&id)
        .await
        .map_err(warp::reject::custom)?
        .ok_or_else(|| warp::reject::custom(DuelError::ProblemNotFound(id)))?;
    Ok(warp::reply::json(&problem))
}

/// Execute submitted code. A passing submit inside a room triggers the
/// room's completion transition before the verdict is returned.
async fn handle_run_code(
    request: ExecutionRequest,
    service: SharedService,
    catalog: SharedCatalog,
    evaluator: SharedEvaluator,
) -> Result<impl Reply, Rejection> {
    let problem = catalog
        .find_by_title(&request.problem_title)
        .await
        .map_err(warp::reject::custom)?
        .ok_or_else(|| {
            warp::reject::custom(DuelError::ProblemNotFound(request.problem_title.clone()))
        })?;

    let verdict = evaluator
        .evaluate(&request, &problem)
        .await
        .map_err(warp::reject::custom)?;

    if request.is_submit && verdict.all_passed() {
        if let Some(room_code) = &request.room_code {
            service
                .record_completion(room_code, &request.user_id)
                .await
                .map_err(warp::reject::custom)?;
        }
    }

    Ok(warp::reply::json(&verdict))
}
