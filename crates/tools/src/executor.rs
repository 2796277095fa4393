//! Tool executor — resolves, validates, and dispatches a single tool call.
//!
//! The executor never retries: retry is a model-level decision, made by
//! the agent loop calling the tool again. Every invocation is timed and
//! emits a [`eda_domain::trace::TraceEvent::ToolDispatched`] record so the
//! streaming bus and log pipeline share one source of truth for "what
//! just happened".

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use eda_domain::config::{ExecConfig, SynthesisConfig};
use eda_domain::error::{Error, Result};
use eda_domain::tool::ToolCall;
use eda_domain::trace::TraceEvent;
use eda_sessions::store::SessionStore;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::job::JobSupervisor;
use crate::registry::{ToolFilter, ToolRegistry};
use crate::workspace::WorkspaceStore;

/// Arguments and ambient context a handler needs to run one invocation.
pub struct Invocation {
    pub session_id: String,
    /// Which transport made this call (`"chat"`, `"rest"`, `"mcp"`, ...).
    /// Used only by the session-management tools that key "current
    /// session" per transport.
    pub transport: String,
    pub arguments: serde_json::Value,
    pub cancel: CancellationToken,
}

pub type HandlerFut = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// A registered tool's implementation. Takes the shared [`ToolContext`]
/// and the per-call [`Invocation`], returns the text payload the model
/// sees (structured results are rendered to YAML/text by the handler
/// itself, since the LLM only consumes text).
pub type HandlerFn = Arc<dyn Fn(Arc<ToolContext>, Invocation) -> HandlerFut + Send + Sync>;

/// Resources shared by every tool handler: per-session workspace access,
/// the session store (for the session-management tools), the job
/// supervisor (for synthesis tools), and the subprocess-relevant config.
pub struct ToolContext {
    pub workspace_root: PathBuf,
    pub max_file_bytes: u64,
    pub sessions: Arc<SessionStore>,
    pub jobs: Arc<JobSupervisor>,
    pub exec: ExecConfig,
    pub synthesis: SynthesisConfig,
    /// The agent loop's system prompt, exposed read-only so the MCP
    /// transport can republish it as the `workflow-prompt` resource
    /// without a separate copy drifting out of sync.
    pub system_prompt: String,
    /// Per-session tool-filter override set by `configure_tool_filter`.
    /// Absent entries mean "use the configured default".
    session_filters: Mutex<HashMap<String, ToolFilter>>,
    /// Per-transport "current session" indirection (§4.3): each transport
    /// keeps its own notion of which session is active so clients on
    /// different transports don't trample each other.
    active_sessions: Mutex<HashMap<String, String>>,
    default_filter: ToolFilter,
}

impl ToolContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspace_root: PathBuf,
        max_file_bytes: u64,
        sessions: Arc<SessionStore>,
        jobs: Arc<JobSupervisor>,
        exec: ExecConfig,
        synthesis: SynthesisConfig,
        system_prompt: String,
        default_filter: ToolFilter,
    ) -> Self {
        Self {
            workspace_root,
            max_file_bytes,
            sessions,
            jobs,
            exec,
            synthesis,
            system_prompt,
            session_filters: Mutex::new(HashMap::new()),
            active_sessions: Mutex::new(HashMap::new()),
            default_filter,
        }
    }

    pub fn workspace_for(&self, session_id: &str) -> WorkspaceStore {
        WorkspaceStore::new(self.workspace_root.join(session_id), self.max_file_bytes)
    }

    /// The filter currently in effect for a session: its override if
    /// `configure_tool_filter` has been called, else the configured
    /// default.
    pub fn current_filter(&self, session_id: &str) -> ToolFilter {
        self.session_filters
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| self.default_filter.clone())
    }

    pub fn set_filter(&self, session_id: &str, filter: ToolFilter) {
        self.session_filters.lock().insert(session_id.to_owned(), filter);
    }

    pub fn active_session(&self, transport: &str) -> Option<String> {
        self.active_sessions.lock().get(transport).cloned()
    }

    pub fn set_active_session(&self, transport: &str, session_id: &str) {
        self.active_sessions
            .lock()
            .insert(transport.to_owned(), session_id.to_owned());
    }

    /// `true` if `session_id` is the active session on any transport —
    /// deletion refuses while this holds.
    pub fn is_active_anywhere(&self, session_id: &str) -> bool {
        self.active_sessions.lock().values().any(|v| v == session_id)
    }

    pub fn clear_active_session(&self, session_id: &str) {
        self.active_sessions.lock().retain(|_, v| v != session_id);
    }
}

/// Outcome of dispatching one [`ToolCall`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub is_error: bool,
    pub content: String,
    pub duration_ms: u64,
    pub bytes: usize,
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    ctx: Arc<ToolContext>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, ctx: Arc<ToolContext>) -> Self {
        Self { registry, ctx }
    }

    pub fn context(&self) -> &Arc<ToolContext> {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Resolve, validate, and invoke `call` on behalf of `session_id`.
    /// Never returns `Err` — a failure becomes an error-flagged
    /// [`ToolResult`] so the agent loop always has a tool-result turn to
    /// append, matching step 4 of the ReAct control core.
    pub async fn execute(
        &self,
        call: &ToolCall,
        session_id: &str,
        transport: &str,
        cancel: CancellationToken,
    ) -> ToolResult {
        let started = Instant::now();
        let outcome = self.dispatch(call, session_id, transport, cancel).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (is_error, content) = match outcome {
            Ok(text) => (false, text),
            Err(e) => (true, e.to_string()),
        };

        TraceEvent::ToolDispatched {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            duration_ms,
            status: if is_error { "error".into() } else { "ok".into() },
        }
        .emit();

        ToolResult {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            is_error,
            bytes: content.len(),
            content,
            duration_ms,
        }
    }

    async fn dispatch(
        &self,
        call: &ToolCall,
        session_id: &str,
        transport: &str,
        cancel: CancellationToken,
    ) -> Result<String> {
        // An unregistered name is a catalog-resolution failure, not "the
        // external binary is absent" (`ToolMissing`'s actual meaning) —
        // it's trivially "not in the filter" since it isn't in any filter.
        let entry = self
            .registry
            .get(&call.tool_name)
            .ok_or_else(|| Error::ToolNotVisible(call.tool_name.clone()))?;

        let filter = self.ctx.current_filter(session_id);
        let visible = self
            .registry
            .filtered(&filter)
            .iter()
            .any(|d| d.name == call.tool_name);
        if !visible {
            return Err(Error::ToolNotVisible(call.tool_name.clone()));
        }

        validate_arguments(&call.tool_name, &entry.definition.parameters, &call.arguments)?;

        let invocation = Invocation {
            session_id: session_id.to_owned(),
            transport: transport.to_owned(),
            arguments: call.arguments.clone(),
            cancel,
        };
        (entry.handler)(self.ctx.clone(), invocation).await
    }
}

/// Explicit pass over the registry's JSON-schema literal: required keys
/// present, types coercible, enum values in range. Runs before the
/// handler is invoked so `BadArgs` messages are uniform across every
/// tool rather than surfacing as ad hoc deserialization errors deep
/// inside each handler.
fn validate_arguments(
    tool_name: &str,
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> Result<()> {
    let bad = |message: String| {
        Error::BadArgs {
            tool: tool_name.to_owned(),
            message,
        }
    };

    let Some(schema_obj) = schema.as_object() else {
        return Ok(());
    };
    let properties = schema_obj.get("properties").and_then(|p| p.as_object());
    let required: Vec<&str> = schema_obj
        .get("required")
        .and_then(|r| r.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let args_obj = arguments
        .as_object()
        .ok_or_else(|| bad("arguments must be a JSON object".into()))?;

    for key in &required {
        if !args_obj.contains_key(*key) {
            return Err(bad(format!("missing required field '{key}'")));
        }
    }

    if let Some(properties) = properties {
        for (key, value) in args_obj {
            let Some(prop_schema) = properties.get(key) else {
                continue;
            };
            if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
                if !type_matches(expected_type, value) {
                    return Err(bad(format!(
                        "field '{key}' expected type '{expected_type}', got {}",
                        type_name(value)
                    )));
                }
            }
            if let Some(enum_values) = prop_schema.get("enum").and_then(|e| e.as_array()) {
                if !enum_values.contains(value) {
                    return Err(bad(format!("field '{key}' must be one of {enum_values:?}")));
                }
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &serde_json::Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eda_domain::tool::{ToolCategory, ToolDefinition};

    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "mode": {"type": "string", "enum": ["a", "b"]},
            },
            "required": ["path"],
        })
    }

    #[test]
    fn missing_required_field_is_bad_args() {
        let err = validate_arguments("write_file", &schema(), &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::BadArgs { .. }));
    }

    #[test]
    fn wrong_type_is_bad_args() {
        let args = serde_json::json!({"path": 5});
        let err = validate_arguments("write_file", &schema(), &args).unwrap_err();
        assert!(matches!(err, Error::BadArgs { .. }));
    }

    #[test]
    fn enum_out_of_range_is_bad_args() {
        let args = serde_json::json!({"path": "x", "mode": "z"});
        let err = validate_arguments("write_file", &schema(), &args).unwrap_err();
        assert!(matches!(err, Error::BadArgs { .. }));
    }

    #[test]
    fn valid_arguments_pass() {
        let args = serde_json::json!({"path": "x", "mode": "a"});
        assert!(validate_arguments("write_file", &schema(), &args).is_ok());
    }

    fn sessions() -> Arc<SessionStore> {
        Arc::new(SessionStore::open_in_memory().unwrap())
    }

    fn context(tmp: &std::path::Path) -> Arc<ToolContext> {
        Arc::new(ToolContext::new(
            tmp.to_path_buf(),
            16 * 1024 * 1024,
            sessions(),
            Arc::new(JobSupervisor::new_in_memory()),
            ExecConfig::default(),
            SynthesisConfig::default(),
            "test system prompt".to_string(),
            ToolFilter::All,
        ))
    }

    #[tokio::test]
    async fn unregistered_tool_is_not_visible_not_a_panic() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Arc::new(ToolRegistry::new());
        let ctx = context(tmp.path());
        let executor = ToolExecutor::new(registry, ctx);
        let call = ToolCall {
            call_id: "c1".into(),
            tool_name: "not_a_real_tool".into(),
            arguments: serde_json::json!({}),
        };
        let result = executor
            .execute(&call, "s1", "chat", CancellationToken::new())
            .await;
        assert!(result.is_error);
        assert!(result.content.contains("not_a_real_tool"));
    }

    #[tokio::test]
    async fn tool_outside_filter_is_not_visible() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolDefinition {
                name: "schematic_tool".into(),
                description: "".into(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
                category: ToolCategory::Synthesis,
            },
            Arc::new(|_ctx, _inv| Box::pin(async { Ok("ok".to_string()) })),
        );
        let ctx = context(tmp.path());
        ctx.set_filter("s1", ToolFilter::Essential);
        let executor = ToolExecutor::new(Arc::new(registry), ctx);
        let call = ToolCall {
            call_id: "c1".into(),
            tool_name: "schematic_tool".into(),
            arguments: serde_json::json!({}),
        };
        let result = executor
            .execute(&call, "s1", "chat", CancellationToken::new())
            .await;
        assert!(result.is_error);
    }
}
