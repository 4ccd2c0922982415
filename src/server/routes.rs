use std::sync::Arc;

use axum::extract::State;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::dispatcher::Dispatcher;
use crate::domain::Seat;
use crate::protocol::adapter::{ProtocolAdapter, RawAction};
use crate::protocol::command::{Command, LobbyCommand};
use crate::rules::{RejectCode, RulesReject};

use super::dto::{
    ActionsRequest, CreateLobbyRequest, JoinLobbyRequest, StartLobbyRequest, SuccessResponse,
    UpdateNameRequest,
};
use super::error::ApiError;
use super::ws::realtime_ws;

#[derive(Clone)]
pub struct ServerContext {
    pub dispatcher: Arc<Dispatcher>,
}

pub struct FunEuchreServer {
    router: Router,
}

impl FunEuchreServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let context = ServerContext { dispatcher };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = Router::new()
            .route("/lobbies/create", post(lobby_create))
            .route("/lobbies/join", post(lobby_join))
            .route("/lobbies/update-name", post(lobby_update_name))
            .route("/lobbies/start", post(lobby_start))
            .route("/actions", post(actions))
            .route("/health", get(health).head(health))
            .route("/realtime/ws", get(realtime_ws))
            .layer(middleware::from_fn(super::logging::log_requests))
            .layer(cors)
            .with_state(context);

        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn new_request_id(provided: Option<String>) -> String {
    provided.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

async fn dispatch(
    ctx: &ServerContext,
    request_id: String,
    command: Command,
) -> Result<Json<SuccessResponse>, ApiError> {
    match ctx.dispatcher.dispatch(command).await {
        Ok(outcome) => Ok(Json(SuccessResponse {
            request_id,
            outbound: outcome.outbound,
            identity: outcome.identity,
        })),
        Err(reject) => Err(ApiError::new(request_id, reject)),
    }
}

async fn lobby_create(
    State(ctx): State<ServerContext>,
    Json(body): Json<CreateLobbyRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let request_id = new_request_id(body.request_id);
    let command = Command::Lobby(LobbyCommand::Create {
        display_name: body.display_name,
    });
    dispatch(&ctx, request_id, command).await
}

async fn lobby_join(
    State(ctx): State<ServerContext>,
    Json(body): Json<JoinLobbyRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let request_id = new_request_id(body.request_id);
    let command = Command::Lobby(LobbyCommand::Join {
        lobby_id: body.lobby_id,
        display_name: body.display_name,
        reconnect_token: body.reconnect_token,
    });
    dispatch(&ctx, request_id, command).await
}

async fn lobby_update_name(
    State(ctx): State<ServerContext>,
    Json(body): Json<UpdateNameRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let request_id = new_request_id(body.request_id);
    let command = Command::Lobby(LobbyCommand::UpdateName {
        lobby_id: body.lobby_id,
        player_id: body.player_id,
        display_name: body.display_name,
    });
    dispatch(&ctx, request_id, command).await
}

async fn lobby_start(
    State(ctx): State<ServerContext>,
    Json(body): Json<StartLobbyRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let request_id = new_request_id(body.request_id);
    let command = Command::Lobby(LobbyCommand::Start {
        lobby_id: body.lobby_id,
        player_id: body.player_id,
    });
    dispatch(&ctx, request_id, command).await
}

/// Resolves the acting seat for a game subcommand from its `session_id` before handing the raw
/// action to the protocol adapter, which never itself looks sessions up.
fn resolve_actor(
    ctx: &ServerContext,
    action: &RawAction,
) -> Result<Option<Seat>, RulesReject> {
    let Some(session_id) = action.session_id() else {
        return Ok(None);
    };
    let session = ctx
        .dispatcher
        .session_store()
        .get_by_id(session_id)
        .ok_or_else(|| RulesReject {
            code: RejectCode::Unauthorized,
            message: "unknown session".to_string(),
        })?;
    let lobby = ctx
        .dispatcher
        .lobby_store()
        .get_by_id(&session.lobby_id)
        .ok_or_else(|| RulesReject {
            code: RejectCode::InvalidState,
            message: "lobby not found".to_string(),
        })?;
    Ok(lobby.seat_of_player(&session.player_id))
}

async fn actions(
    State(ctx): State<ServerContext>,
    Json(body): Json<ActionsRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let request_id = new_request_id(body.request_id);
    let actor = resolve_actor(&ctx, &body.action).map_err(|reject| ApiError::new(request_id.clone(), reject))?;
    let command = ProtocolAdapter::to_domain_command(body.action, actor)
        .map_err(|reject| ApiError::new(request_id.clone(), reject))?;
    dispatch(&ctx, request_id, command).await
}
