//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::app::AppState;
use crate::game::{GameError, PlayerSlot, SessionId};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::BoardView;

/// Upper bound on request body size, enforced before JSON parsing
const MAX_JSON_BODY_BYTES: usize = 4096;

/// Idle timeout for request handling
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - explicit origins (comma-separated in
    // CLIENT_ORIGIN) or wide open when unset
    let cors = if state.config.client_origin.trim() == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let allowed_origins: Vec<header::HeaderValue> = state
            .config
            .client_origin
            .split(',')
            .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/create", post(create_handler))
        .route("/join", post(join_handler))
        .route("/sessions", get(list_handler))
        .layer(DefaultBodyLimit::max(MAX_JSON_BODY_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    sessions: usize,
    open_sessions: usize,
    active_matches: usize,
    connections: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.sessions.lock().stats();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        sessions: stats.total,
        open_sessions: stats.waiting,
        active_matches: stats.in_progress,
        connections: state.connections.connected(),
    })
}

// ============================================================================
// Session endpoints
// ============================================================================

#[derive(Deserialize)]
struct CreateSessionRequest {
    player_name: String,
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: SessionId,
    player: &'static str,
    /// The caller's own board, fleet in the clear
    board: BoardView,
}

async fn create_handler(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateSessionRequest>, AppError>,
) -> Result<Json<SessionResponse>, AppError> {
    let player_name = req.player_name.trim().to_string();
    if player_name.is_empty() {
        return Err(GameError::InvalidPlayerName.into());
    }

    // Fleet placement happens under the lock; the response is captured
    // before release so no later mutation can leak into it
    let (session_id, board) = {
        let mut table = state.sessions.lock();
        let session = table.create(player_name)?;
        (
            session.id,
            BoardView::owner(&session.seat(PlayerSlot::One).board),
        )
    };

    info!(session_id = %session_id, "Session created");

    Ok(Json(SessionResponse {
        session_id,
        player: "Player 1",
        board,
    }))
}

#[derive(Deserialize)]
struct JoinSessionRequest {
    session_id: SessionId,
    player_name: String,
}

async fn join_handler(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<JoinSessionRequest>, AppError>,
) -> Result<Json<SessionResponse>, AppError> {
    let player_name = req.player_name.trim().to_string();
    if player_name.is_empty() {
        return Err(GameError::InvalidPlayerName.into());
    }

    let (session_id, board) = {
        let mut table = state.sessions.lock();
        let session = table.join(req.session_id, player_name)?;
        (
            session.id,
            BoardView::owner(&session.seat(PlayerSlot::Two).board),
        )
    };

    info!(session_id = %session_id, "Second player joined session");

    Ok(Json(SessionResponse {
        session_id,
        player: "Player 2",
        board,
    }))
}

#[derive(Serialize)]
struct SessionSummary {
    id: SessionId,
    player1: String,
    created_at: i64,
}

/// The matchmaking lobby: sessions still waiting for a second player
async fn list_handler(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    let open = state.sessions.lock().open_sessions();

    Json(
        open.into_iter()
            .map(|s| SessionSummary {
                id: s.id,
                player1: s.player_one,
                created_at: s.created_at.timestamp(),
            })
            .collect(),
    )
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large")]
    PayloadTooLarge,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // The body-limit layer trips while buffering the payload
            JsonRejection::BytesRejection(_) => AppError::PayloadTooLarge,
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::Game(err) => (status_for(err), err.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

fn status_for(err: &GameError) -> StatusCode {
    match err {
        GameError::SessionNotFound => StatusCode::NOT_FOUND,
        GameError::CapacityExceeded => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    }
}
