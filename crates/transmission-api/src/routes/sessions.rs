//! REST routes for match sessions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Deserialize;
use tracing::{info, instrument};
use transmission_core::ids::SessionId;
use transmission_match::application::query_handlers::{self, SessionView};
use transmission_match::application::command_handlers;
use transmission_match::domain::commands;
use transmission_match::domain::events::SessionSummary;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Id to register the session under.
    pub id: String,
}

/// POST /
#[instrument(skip(state, request), fields(session_id = %request.id))]
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSummary>), ApiError> {
    let command = commands::CreateSession {
        correlation_id: Uuid::new_v4(),
        session_id: SessionId::new(request.id),
    };

    info!(correlation_id = %command.correlation_id, "handling create_session command");

    let summary = command_handlers::handle_create_session(&command, &state.registry)?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /
async fn list_open_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(query_handlers::list_open_sessions(&state.registry))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let view = query_handlers::get_session_by_id(&state.registry, &SessionId::new(id))?;
    Ok(Json(view))
}

/// Returns the router for session endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_open_sessions).post(create_session))
        .route("/{id}", get(get_session))
}
