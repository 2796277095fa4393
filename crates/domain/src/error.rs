/// Shared error type used across all crates in this workspace.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session conflict: {0}")]
    SessionConflict(String),

    #[error("bad arguments for {tool}: {message}")]
    BadArgs { tool: String, message: String },

    #[error("tool not visible in current filter: {0}")]
    ToolNotVisible(String),

    #[error("tool executable missing: {0}")]
    ToolMissing(String),

    #[error("cancelled")]
    Cancelled,

    #[error("step budget exhausted after {0} iterations")]
    StepBudgetExhausted(u32),

    #[error("workspace path escapes session root: {0}")]
    WorkspacePathEscape(String),

    #[error("file too large: {path} ({size} bytes, cap {cap})")]
    FileTooLarge { path: String, size: u64, cap: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("edit anchor not found: {0}")]
    ConflictNotFound(String),

    #[error("synthesis job already running for session: {0}")]
    JobConflict(String),

    #[error("synthesis job stuck: {0}")]
    JobStuck(String),

    #[error("synthesis job failed: {0}")]
    JobFailed(String),

    #[error("persistence error: {0}")]
    PersistenceError(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable machine-readable code for transport error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Timeout(_) => "timeout",
            Error::Provider { .. } => "provider_error",
            Error::Config(_) => "config_error",
            Error::Auth(_) => "auth_error",
            Error::SessionNotFound(_) => "session_not_found",
            Error::SessionConflict(_) => "session_conflict",
            Error::BadArgs { .. } => "bad_args",
            Error::ToolNotVisible(_) => "tool_not_visible",
            Error::ToolMissing(_) => "tool_missing",
            Error::Cancelled => "cancelled",
            Error::StepBudgetExhausted(_) => "step_budget_exhausted",
            Error::WorkspacePathEscape(_) => "workspace_path_escape",
            Error::FileTooLarge { .. } => "file_too_large",
            Error::NotFound(_) => "not_found",
            Error::ConflictNotFound(_) => "conflict_not_found",
            Error::JobConflict(_) => "job_conflict",
            Error::JobStuck(_) => "job_stuck",
            Error::JobFailed(_) => "job_failed",
            Error::PersistenceError(_) => "persistence_error",
            Error::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
