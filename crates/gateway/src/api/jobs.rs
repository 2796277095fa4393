//! Synthesis job control — start, poll, wait on, and cancel the
//! long-running container runs the Job Supervisor manages, independent of
//! the in-loop synthesis tools so an operator can drive a run without a
//! live agent turn.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use eda_domain::error::Error;
use eda_tools::job::SynthesisParams;

use crate::state::AppState;

fn error_status(e: &Error) -> StatusCode {
    match e {
        Error::NotFound(_) | Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
        Error::JobConflict(_) => StatusCode::CONFLICT,
        Error::BadArgs { .. } => StatusCode::BAD_REQUEST,
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
pub struct StartJobBody {
    pub params: SynthesisParams,
    #[serde(default)]
    pub restart_stuck: bool,
}

pub async fn start_job(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<StartJobBody>,
) -> axum::response::Response {
    let workdir = state.executor.context().workspace_for(&session_id).root().to_path_buf();
    match state
        .jobs
        .start(&session_id, workdir, body.params, body.restart_stuck)
    {
        Ok(run_id) => (StatusCode::ACCEPTED, Json(serde_json::json!({ "run_id": run_id }))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> axum::response::Response {
    match state.jobs.status(&run_id) {
        Some(job) => Json(job).into_response(),
        None => error_response(Error::NotFound(run_id.to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct WaitQuery {
    #[serde(default = "default_wait_ms")]
    pub timeout_ms: u64,
}

fn default_wait_ms() -> u64 {
    30_000
}

pub async fn job_wait(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Query(q): Query<WaitQuery>,
) -> axum::response::Response {
    let timeout = Duration::from_millis(q.timeout_ms.min(120_000));
    match state.jobs.wait(&run_id, timeout).await {
        Some(job) => Json(job).into_response(),
        None => error_response(Error::NotFound(run_id.to_string())),
    }
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> axum::response::Response {
    if state.jobs.cancel(&run_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(Error::NotFound(run_id.to_string()))
    }
}

pub async fn job_metrics(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> axum::response::Response {
    match state.jobs.metrics(&run_id) {
        Some(metrics) => Json(metrics).into_response(),
        None => error_response(Error::NotFound(run_id.to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchLogsQuery {
    pub pattern: String,
}

pub async fn search_logs(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Query(q): Query<SearchLogsQuery>,
) -> axum::response::Response {
    match state.jobs.search_logs(&run_id, &q.pattern) {
        Ok(lines) => Json(serde_json::json!({ "lines": lines })).into_response(),
        Err(e) => error_response(e),
    }
}
