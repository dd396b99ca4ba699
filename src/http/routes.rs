//! HTTP route definitions

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::error;
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{BattlegroundMatrix, Snapshot, TurnSubmission};
use crate::http::middleware::{require_auth, AuthenticatedUser};
use crate::matches::service::{MatchSummary, NewMatch};
use crate::matches::ServiceError;
use crate::util::time::uptime_secs;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes (no auth required)
    let public_routes = Router::new().route("/health", get(health_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/match/new", post(new_match_handler))
        .route("/match/start/:uuid", post(start_match_handler))
        .route("/match/view/:uuid", get(view_match_handler))
        .route("/turn/next/:uuid", post(next_turn_handler))
        .route("/turn/view/:uuid/:turn", get(view_turn_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Unparseable ids can never name a stored match
fn parse_match_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(ServiceError::NotFound.to_string()))
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    store: &'static str,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        store: state.matches.store_backend(),
    })
}

// ============================================================================
// Match endpoints
// ============================================================================

#[derive(Serialize)]
struct NewMatchResponse {
    message: &'static str,
    uuid: Uuid,
}

async fn new_match_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<NewMatch>, JsonRejection>,
) -> Result<(StatusCode, Json<NewMatchResponse>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let uuid = state.matches.create_match(auth.user_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(NewMatchResponse {
            message: "Match created successfully.",
            uuid,
        }),
    ))
}

async fn start_match_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(uuid): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let match_id = parse_match_id(&uuid)?;
    state.matches.start_match(match_id, auth.user_id).await?;

    Ok(Json(MessageResponse {
        message: "Match started successfully.",
    }))
}

#[derive(Serialize)]
struct MatchViewResponse {
    message: &'static str,
    data: MatchSummary,
}

async fn view_match_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(uuid): Path<String>,
) -> Result<Json<MatchViewResponse>, AppError> {
    let match_id = parse_match_id(&uuid)?;
    let data = state.matches.match_summary(match_id, auth.user_id).await?;

    Ok(Json(MatchViewResponse {
        message: "Match data retrieved successfully.",
        data,
    }))
}

// ============================================================================
// Turn endpoints
// ============================================================================

#[derive(Serialize)]
struct NextTurnResponse {
    message: &'static str,
    turn: u32,
}

async fn next_turn_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(uuid): Path<String>,
    payload: Result<Json<TurnSubmission>, JsonRejection>,
) -> Result<Json<NextTurnResponse>, AppError> {
    let match_id = parse_match_id(&uuid)?;

    if !state.turn_limiter.check(auth.user_id) {
        return Err(AppError::TooManyRequests);
    }

    let Json(submission) = payload
        .map_err(|e| AppError::BadRequest(format!("Malformed turn payload: {}", e.body_text())))?;

    let turn = state
        .matches
        .commit_turn(match_id, submission, auth.user_id)
        .await?;

    Ok(Json(NextTurnResponse {
        message: "Turn submitted successfully.",
        turn,
    }))
}

#[derive(Serialize)]
struct TurnViewResponse {
    message: &'static str,
    data: Snapshot,
    matrix: BattlegroundMatrix,
}

async fn view_turn_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((uuid, turn)): Path<(String, String)>,
) -> Result<Json<TurnViewResponse>, AppError> {
    let match_id = parse_match_id(&uuid)?;
    let index: u32 = turn
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid turn number provided.".to_string()))?;

    let view = state
        .matches
        .view_turn(match_id, index, auth.user_id)
        .await?;

    Ok(Json(TurnViewResponse {
        message: "Turn data retrieved successfully.",
        data: view.snapshot,
        matrix: view.matrix,
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound => AppError::NotFound(err.to_string()),
            ServiceError::Unauthorized(_) => AppError::Unauthorized(err.to_string()),
            ServiceError::MatchNotStarted
            | ServiceError::MatchAlreadyStarted
            | ServiceError::Game(_) => AppError::BadRequest(err.to_string()),
            ServiceError::Store(e) => {
                error!(error = %e, "Match store failure");
                AppError::Internal("Match storage is unavailable.".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many turn submissions, slow down.".to_string(),
            ),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "message": message
        });

        (status, Json(body)).into_response()
    }
}
