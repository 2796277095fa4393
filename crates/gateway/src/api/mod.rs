pub mod auth;
pub mod chat;
pub mod jobs;
pub mod sessions;
pub mod tools;
pub mod workspace;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the bearer-token middleware configured by
/// `server.api_token_env`).
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(health));

    let protected = Router::new()
        // Tool schema introspection
        .route("/v1/tools", get(tools::list_tools))
        // Sessions
        .route(
            "/v1/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/v1/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/v1/sessions/:id/history", get(sessions::get_history))
        .route("/v1/sessions/:id/tools", get(tools::list_session_tools))
        // Chat (SSE + WebSocket)
        .route("/v1/sessions/:id/chat", post(chat::send_message_sse))
        .route("/v1/sessions/:id/chat/ws", get(chat::chat_ws))
        // Workspace files
        .route(
            "/v1/sessions/:id/files",
            get(workspace::list_files),
        )
        .route(
            "/v1/sessions/:id/files/*path",
            get(workspace::read_file)
                .put(workspace::write_file)
                .delete(workspace::delete_file),
        )
        .route("/v1/sessions/:id/files-edit", post(workspace::edit_file))
        // Synthesis job control
        .route("/v1/sessions/:id/jobs", post(jobs::start_job))
        .route("/v1/jobs/:run_id", get(jobs::job_status))
        .route("/v1/jobs/:run_id/wait", get(jobs::job_wait))
        .route("/v1/jobs/:run_id/cancel", post(jobs::cancel_job))
        .route("/v1/jobs/:run_id/metrics", get(jobs::job_metrics))
        .route("/v1/jobs/:run_id/logs", get(jobs::search_logs))
        // Apply API auth middleware to all protected routes.
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}
