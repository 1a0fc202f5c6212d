//! HTTP API endpoints (request/response path).
//!
//! Every handler acts as the caller's session identity and returns the same
//! per-viewer projections the WebSocket pushes.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::admin_auth_middleware;
use crate::error::GameError;
use crate::projector::LobbyView;
use crate::protocol::ServerMessage;
use crate::session::session_middleware;
use crate::state::{AppState, CoverageReport, ImportReport, QuestionRow};
use crate::types::*;
use crate::ws;

/// A `GameError` rendered as an HTTP rejection with a `{code, msg}` body
#[derive(Debug)]
pub struct ApiError(pub GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    msg: String,
}

pub fn status_for(err: &GameError) -> StatusCode {
    match err {
        GameError::NotFound(_) => StatusCode::NOT_FOUND,
        GameError::NotHost => StatusCode::FORBIDDEN,
        GameError::InvalidSelection(_) | GameError::InvalidInput(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        GameError::NotYourTurn
        | GameError::AlreadyAnswered
        | GameError::RoomFull { .. }
        | GameError::NicknameTaken(_)
        | GameError::IconTaken(_)
        | GameError::RoomAlreadyStarted
        | GameError::IncompleteBank { .. }
        | GameError::NotEnoughPlayers { .. } => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        tracing::warn!("Rejected request: {}", self.0);
        let body = ErrorBody {
            code: self.0.code(),
            msg: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub nickname: String,
    pub icon: String,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub player_id: PlayerId,
    pub nickname: String,
    pub icon: String,
    pub icon_display: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub rotation: Option<RotationPolicy>,
}

#[derive(Debug, Deserialize)]
pub struct ChooseRequest {
    pub category: String,
    pub level: i64,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub option: String,
    #[serde(default)]
    pub turn_id: Option<TurnId>,
}

/// POST /api/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionToken>,
) -> ApiResult<(StatusCode, Json<LobbyView>)> {
    let room = state.create_room().await;
    let view = state.lobby_view(&room.code, Some(&session)).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/rooms/{code}
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Extension(session): Extension<SessionToken>,
) -> ApiResult<Json<LobbyView>> {
    Ok(Json(state.lobby_view(&code, Some(&session)).await?))
}

/// POST /api/rooms/{code}/join
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Extension(session): Extension<SessionToken>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<Json<JoinResponse>> {
    let player = state
        .join_room(&code, &session, &req.nickname, &req.icon)
        .await?;
    Ok(Json(JoinResponse {
        player_id: player.id,
        nickname: player.nickname,
        icon_display: icon_display(&player.icon),
        icon: player.icon,
    }))
}

/// POST /api/rooms/{code}/leave
pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Extension(session): Extension<SessionToken>,
) -> ApiResult<StatusCode> {
    state.leave_room(&code, &session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/rooms/{code}/start
///
/// Body is optional; `{"rotation": "on_wrong_only"}` overrides the default policy.
pub async fn start_game(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Extension(session): Extension<SessionToken>,
    body: Bytes,
) -> ApiResult<Json<ServerMessage>> {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice::<StartRequest>(&body)
            .map_err(|e| GameError::InvalidInput(e.to_string()))?
    };
    state.start_game(&code, &session, req.rotation).await?;
    let view = state.game_view(&code, Some(&session)).await?;
    Ok(Json(view.into()))
}

/// GET /api/rooms/{code}/game
pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Extension(session): Extension<SessionToken>,
) -> ApiResult<Json<ServerMessage>> {
    let view = state.game_view(&code, Some(&session)).await?;
    Ok(Json(view.into()))
}

/// POST /api/rooms/{code}/game/choose
///
/// Returns the chooser's fresh snapshot, which carries the revealed question.
pub async fn choose(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Extension(session): Extension<SessionToken>,
    Json(req): Json<ChooseRequest>,
) -> ApiResult<Json<ServerMessage>> {
    state
        .choose_question(&code, &session, &req.category, req.level)
        .await?;
    let view = state.game_view(&code, Some(&session)).await?;
    Ok(Json(view.into()))
}

/// POST /api/rooms/{code}/game/answer
pub async fn answer(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Extension(session): Extension<SessionToken>,
    Json(req): Json<AnswerRequest>,
) -> ApiResult<Json<ServerMessage>> {
    let option = AnswerOption::parse(&req.option)
        .ok_or_else(|| GameError::InvalidInput(format!("'{}' is not A, B or C", req.option)))?;
    let outcome = state
        .submit_answer(&code, &session, option, req.turn_id.as_deref())
        .await?;
    Ok(Json(ServerMessage::AnswerAccepted {
        turn_id: outcome.turn.id,
        was_correct: outcome.was_correct,
        points_awarded: outcome.points_awarded,
        correct_option: outcome.correct_option,
    }))
}

/// POST /api/questions/import
///
/// `Content-Type: text/csv` takes a CSV with a header line; anything else is a JSON array of rows.
pub async fn import_questions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ImportReport>> {
    let is_csv = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("text/csv"));

    let report = if is_csv {
        state
            .import_questions_csv(&body)
            .await
            .map_err(|e| GameError::InvalidInput(e.to_string()))?
    } else {
        let rows: Vec<QuestionRow> = serde_json::from_slice(&body)
            .map_err(|e| GameError::InvalidInput(e.to_string()))?;
        state.import_questions(rows).await
    };
    Ok(Json(report))
}

/// GET /api/questions/coverage
pub async fn question_coverage(State(state): State<Arc<AppState>>) -> Json<CoverageReport> {
    Json(state.question_coverage().await)
}

/// All HTTP and WebSocket routes, behind the session middleware.
/// Question-bank routes additionally require the admin credentials.
pub fn router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/api/questions/import", post(import_questions))
        .route("/api/questions/coverage", get(question_coverage))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/{code}", get(get_room))
        .route("/api/rooms/{code}/join", post(join_room))
        .route("/api/rooms/{code}/leave", post(leave_room))
        .route("/api/rooms/{code}/start", post(start_game))
        .route("/api/rooms/{code}/game", get(get_game))
        .route("/api/rooms/{code}/game/choose", post(choose))
        .route("/api/rooms/{code}/game/answer", post(answer))
        .route("/ws/rooms/{code}", get(ws::ws_handler))
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .with_state(state)
}
