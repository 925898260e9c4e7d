//! HTTP API endpoints for SQL Coach.
//!
//! This module exposes the learner events as a small REST surface. Every
//! handler forwards to the [`SessionController`]; state changes are also
//! pushed to `/ws` subscribers.
//!
//! # Endpoints
//!
//! - `GET /api/health` - Engine readiness and tutor model
//! - `GET /api/session` - Current session snapshot
//! - `GET /api/lessons` - Lesson listing with progress markers
//! - `POST /api/lesson/select` - Select a lesson by index
//! - `POST /api/lesson/next` / `POST /api/lesson/previous` - Step through the course
//! - `PUT /api/query` - Replace the live query text
//! - `POST /api/query/run` - Run the live query
//! - `POST /api/query/reset` - Restore the lesson's initial query
//! - `POST /api/tutor/ask` - Ask the tutor a question
//! - `POST /api/database/reset` - Re-seed the engine
//! - `GET /ws` - WebSocket event stream
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sqlcoach_session::{
//!     create_router, AppState, Config, DatasetSeed, EventBroadcaster, GeminiBackend,
//!     LessonCatalog, Session, SessionController, TutorAssembler,
//! };
//!
//! # async fn example() -> sqlcoach_session::Result<()> {
//! let config = Config::default();
//! let backend = GeminiBackend::new(&config.tutor)?;
//! let controller = SessionController::new(
//!     Session::new(LessonCatalog::builtin(), DatasetSeed::builtin()),
//!     TutorAssembler::new(Arc::new(backend), config.tutor.model.clone()),
//!     EventBroadcaster::new(config.event_capacity),
//! );
//! controller.initialize().await?;
//!
//! let router = create_router(AppState::new(config, controller));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::controller::SessionController;
use crate::error::SqlCoachError;
use crate::query::Outcome;
use crate::session::{
    LessonChange, LessonSummary, PendingAsk, Progress, SessionSnapshot, SessionStatus,
};
use crate::transcript::Message;
use crate::websocket::ws_handler;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /api/lesson/select`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectLessonRequest {
    /// Catalog index to select.
    pub index: usize,
}

/// Response body for `GET /api/lessons`.
#[derive(Debug, Clone, Serialize)]
pub struct LessonsResponse {
    /// Lessons in course order.
    pub lessons: Vec<LessonSummary>,
    /// Course position.
    pub progress: Progress,
}

/// Request body for `PUT /api/query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditQueryRequest {
    /// New live query text.
    pub text: String,
}

/// Request body for `POST /api/tutor/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// The learner's question.
    pub question: String,
    /// Wait for the tutor reply instead of returning the pending marker.
    #[serde(default)]
    pub wait: bool,
}

/// Response body for `POST /api/tutor/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AskResponse {
    /// The question was accepted; the reply will arrive on `/ws`.
    Pending {
        /// The pending marker.
        pending: PendingAsk,
    },
    /// The tutor answered.
    Answered {
        /// The appended tutor message.
        message: Message,
    },
}

/// Response body for `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Whether the engine is loaded.
    pub ready: bool,
    /// Model used for tutor requests.
    pub model: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Config,
    /// Controller for the single learner session.
    pub controller: SessionController,
}

impl AppState {
    /// Creates a new `AppState`.
    #[must_use]
    pub const fn new(config: Config, controller: SessionController) -> Self {
        Self { config, controller }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Error returned by API handlers.
#[derive(Debug)]
pub struct ApiError(SqlCoachError);

impl From<SqlCoachError> for ApiError {
    fn from(err: SqlCoachError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SqlCoachError::EngineNotReady => StatusCode::SERVICE_UNAVAILABLE,
            SqlCoachError::EmptyQuestion => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(status = status.as_u16(), error = %self.0, "Request rejected");

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints and the `/ws` stream.
///
/// The router carries `TraceLayer` request logging and a permissive
/// `CorsLayer` so a separately served learner surface can call it.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handle_health))
        .route("/session", get(handle_session))
        .route("/lessons", get(handle_lessons))
        .route("/lesson/select", post(handle_select_lesson))
        .route("/lesson/next", post(handle_next_lesson))
        .route("/lesson/previous", post(handle_previous_lesson))
        .route("/query", put(handle_edit_query))
        .route("/query/run", post(handle_run))
        .route("/query/reset", post(handle_reset_query))
        .route("/tutor/ask", post(handle_ask))
        .route("/database/reset", post(handle_reset_database));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/health`.
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.controller.snapshot().await;
    Json(HealthResponse {
        ready: snapshot.status == SessionStatus::Ready,
        model: state.config.tutor.model.clone(),
    })
}

/// Handler for `GET /api/session`.
async fn handle_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot().await)
}

/// Handler for `GET /api/lessons`.
async fn handle_lessons(State(state): State<Arc<AppState>>) -> Json<LessonsResponse> {
    let (lessons, progress) = state.controller.lessons().await;
    Json(LessonsResponse { lessons, progress })
}

/// Handler for `POST /api/lesson/select`.
async fn handle_select_lesson(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectLessonRequest>,
) -> ApiResult<Json<LessonChange>> {
    info!(index = request.index, "Select lesson request");
    Ok(Json(state.controller.select_lesson(request.index).await?))
}

/// Handler for `POST /api/lesson/next`.
async fn handle_next_lesson(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<LessonChange>> {
    Ok(Json(state.controller.next_lesson().await?))
}

/// Handler for `POST /api/lesson/previous`.
async fn handle_previous_lesson(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<LessonChange>> {
    Ok(Json(state.controller.previous_lesson().await?))
}

/// Handler for `PUT /api/query`.
async fn handle_edit_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EditQueryRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    state.controller.edit_query(request.text).await?;
    Ok(Json(state.controller.snapshot().await))
}

/// Handler for `POST /api/query/run`.
async fn handle_run(State(state): State<Arc<AppState>>) -> ApiResult<Json<Outcome>> {
    let outcome = state.controller.run().await?;
    Ok(Json(outcome))
}

/// Handler for `POST /api/query/reset`.
async fn handle_reset_query(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SessionSnapshot>> {
    state.controller.reset_query().await?;
    Ok(Json(state.controller.snapshot().await))
}

/// Handler for `POST /api/tutor/ask`.
///
/// Returns `202 Accepted` with the pending marker, or `200 OK` with the tutor
/// message when `wait` is set.
async fn handle_ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> ApiResult<(StatusCode, Json<AskResponse>)> {
    info!(
        question_len = request.question.len(),
        wait = request.wait,
        "Tutor question received"
    );

    if request.wait {
        let message = state.controller.ask_tutor(&request.question).await?;
        Ok((StatusCode::OK, Json(AskResponse::Answered { message })))
    } else {
        let pending = state.controller.dispatch_ask(&request.question).await?;
        Ok((StatusCode::ACCEPTED, Json(AskResponse::Pending { pending })))
    }
}

/// Handler for `POST /api/database/reset`.
async fn handle_reset_database(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SessionSnapshot>> {
    state.controller.reset_database().await?;
    Ok(Json(state.controller.snapshot().await))
}

// ============================================================================
// Tests
// ============================================================================
