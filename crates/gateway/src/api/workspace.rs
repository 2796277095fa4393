//! Per-session workspace file access over REST — the same
//! [`eda_tools::workspace::WorkspaceStore`] the in-loop file tools use, so a
//! human operator sees exactly what the model sees.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use eda_domain::error::Error;
use eda_tools::workspace::{Edit, WriteMode};

use crate::state::AppState;

fn error_status(e: &Error) -> StatusCode {
    match e {
        Error::NotFound(_) | Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
        Error::WorkspacePathEscape(_) | Error::BadArgs { .. } => StatusCode::BAD_REQUEST,
        Error::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::ConflictNotFound(_) => StatusCode::CONFLICT,
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
pub struct ListQuery {
    #[serde(default)]
    pub dir: Option<String>,
}

pub async fn list_files(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(q): Query<ListQuery>,
) -> axum::response::Response {
    let workspace = state.executor.context().workspace_for(&session_id);
    match workspace.list_files(q.dir.as_deref().unwrap_or("")).await {
        Ok(entries) => Json(serde_json::json!({ "entries": entries })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn read_file(
    State(state): State<AppState>,
    Path((session_id, path)): Path<(String, String)>,
) -> axum::response::Response {
    let workspace = state.executor.context().workspace_for(&session_id);
    match workspace.read_file(&path).await {
        Ok(bytes) => (
            [(axum::http::header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn write_file(
    State(state): State<AppState>,
    Path((session_id, path)): Path<(String, String)>,
    body: Bytes,
) -> axum::response::Response {
    let workspace = state.executor.context().workspace_for(&session_id);
    match workspace
        .write_file(&path, &body, WriteMode::CreateOrReplace)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct EditFileBody {
    pub path: String,
    pub edits: Vec<Edit>,
}

/// Edit takes its target path from the request body rather than the URL
/// so it doesn't collide with the wildcard file route on `path`.
pub async fn edit_file(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<EditFileBody>,
) -> axum::response::Response {
    let workspace = state.executor.context().workspace_for(&session_id);
    match workspace.edit_file(&body.path, &body.edits).await {
        Ok(diff) => Json(serde_json::json!({ "diff": diff })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path((session_id, path)): Path<(String, String)>,
) -> axum::response::Response {
    let workspace = state.executor.context().workspace_for(&session_id);
    match workspace.delete_file(&path).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
