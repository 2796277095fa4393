//! Session management endpoints: create, list, inspect, and delete the
//! design-project sessions the chat and MCP transports operate on.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use eda_domain::error::Error;

use crate::state::AppState;

fn error_status(e: &Error) -> StatusCode {
    match e {
        Error::SessionNotFound(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::SessionConflict(_) | Error::JobConflict(_) => StatusCode::CONFLICT,
        Error::BadArgs { .. } | Error::WorkspacePathEscape(_) => StatusCode::BAD_REQUEST,
        Error::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: Error) -> axum::response::Response {
    let status = error_status(&e);
    (
        status,
        Json(serde_json::json!({ "error": e.code(), "message": e.to_string() })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> axum::response::Response {
    let model = body.model.unwrap_or_else(|| state.config.llm.provider.default_model.clone());
    let name = body.name.unwrap_or_else(|| body.id.clone());
    match state.sessions.create(&body.id, &name, &model) {
        Ok(session) => (StatusCode::CREATED, Json(session)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_sessions(State(state): State<AppState>) -> axum::response::Response {
    match state.sessions.list() {
        Ok(sessions) => Json(serde_json::json!({ "sessions": sessions, "count": sessions.len() }))
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.sessions.open(&id) {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => error_response(Error::SessionNotFound(id)),
        Err(e) => error_response(e),
    }
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.sessions.history(&id) {
        Ok(turns) => Json(serde_json::json!({ "session_id": id, "turns": turns })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if state.executor.context().is_active_anywhere(&id) {
        return error_response(Error::SessionConflict(format!(
            "session '{id}' is active on a transport; disconnect before deleting"
        )));
    }
    match state.sessions.delete(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
