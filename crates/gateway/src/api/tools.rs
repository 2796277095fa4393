//! Tool schema introspection — read-only, the same definitions the model
//! sees through the chat loop and MCP clients see through `tools/list`.
//!
//! No generic exec/run-arbitrary-command endpoint is exposed here; every
//! tool invocation goes through the agent loop or an MCP `tools/call`,
//! both of which validate arguments against the tool's own schema.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// `GET /v1/tools` — every tool definition the registry knows about.
pub async fn list_tools(State(state): State<AppState>) -> impl IntoResponse {
    let definitions = state.executor.registry().schema_export();
    Json(serde_json::json!({ "tools": definitions }))
}

/// `GET /v1/sessions/:id/tools` — the tools visible to that session under
/// its current filter (essential-only, custom category set, or all).
pub async fn list_session_tools(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let filter = state.executor.context().current_filter(&session_id);
    let definitions = state.executor.registry().filtered(&filter);
    Json(serde_json::json!({ "tools": definitions }))
}
