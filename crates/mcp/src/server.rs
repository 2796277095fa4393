//! [`EdaMcpServer`] — the rmcp [`ServerHandler`] implementation.
//!
//! Wraps the same [`ToolExecutor`] the chat and REST transports use, so
//! `tools/call` here runs through exactly one dispatch path (resolve,
//! validate, dispatch, trace) regardless of which transport is asking.
//! `tools/list` is sourced directly from the registry's schema export —
//! there is no separate MCP-only tool description to keep in sync.
//!
//! Unlike a stateless MCP server, this one keeps a "current session" per
//! MCP connection via [`ToolContext`]'s per-transport indirection: a
//! client calls `create_session`/`set_active_session` like any other
//! tool, and subsequent calls on the same connection resolve against
//! that session until it is changed.

use std::sync::Arc;

use eda_tools::{ToolExecutor, ToolResult};
use rmcp::{
    handler::server::ServerHandler,
    model::{
        CallToolRequestParams, CallToolResult, ListResourcesResult, ListToolsResult,
        PaginatedRequestParams, ReadResourceRequestParams, ReadResourceResult, Resource,
        ResourceContents, ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    ErrorData as McpError,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bridge::{definition_to_mcp_tool, result_to_call_result};

/// Fixed transport name this server registers its "current session"
/// indirection under. One `EdaMcpServer` instance, however many
/// connections it serves, shares one active-session slot — matching a
/// single long-lived MCP client (Cursor, Claude Desktop, an internal
/// dashboard) driving one design session at a time.
const TRANSPORT: &str = "mcp";

/// URI of the fixed "workflow prompt" resource (§6.1).
const WORKFLOW_PROMPT_URI: &str = "eda-agent://workflow-prompt";

#[derive(Clone)]
pub struct EdaMcpServer {
    executor: Arc<ToolExecutor>,
}

impl EdaMcpServer {
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self { executor }
    }

    fn current_session(&self) -> String {
        self.executor
            .context()
            .active_session(TRANSPORT)
            .unwrap_or_else(|| "default".to_string())
    }
}

impl ServerHandler for EdaMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let executor = self.executor.clone();
        let session_id = self.current_session();
        async move {
            let filter = executor.context().current_filter(&session_id);
            let tools = executor
                .registry()
                .filtered(&filter)
                .into_iter()
                .map(definition_to_mcp_tool)
                .collect();
            Ok(ListToolsResult {
                tools,
                next_cursor: None,
                meta: None,
            })
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = request
            .arguments
            .map(|m| serde_json::Value::Object(m.into_iter().collect()))
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let call = eda_domain::tool::ToolCall {
            call_id: Uuid::new_v4().to_string(),
            tool_name: request.name.to_string(),
            arguments: args,
        };

        let session_id = self.current_session();
        let result: ToolResult = self
            .executor
            .execute(&call, &session_id, TRANSPORT, CancellationToken::new())
            .await;
        Ok(result_to_call_result(result))
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            Ok(ListResourcesResult {
                resources: vec![Resource::new(
                    WORKFLOW_PROMPT_URI,
                    "Workflow prompt",
                    Some("The system prompt driving this agent's tool use".to_string()),
                    Some("text/plain".to_string()),
                )],
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        let system_prompt = self.executor.context().system_prompt.clone();
        async move {
            if request.uri != WORKFLOW_PROMPT_URI {
                return Err(McpError::resource_not_found(
                    "unknown resource uri",
                    Some(serde_json::json!({ "uri": request.uri })),
                ));
            }
            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(system_prompt, WORKFLOW_PROMPT_URI)],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eda_domain::config::{ExecConfig, SynthesisConfig};
    use eda_sessions::store::SessionStore;
    use eda_tools::job::JobSupervisor;
    use eda_tools::registry::{build_registry, ToolFilter};
    use eda_tools::ToolContext;

    fn make_server() -> (tempfile::TempDir, EdaMcpServer) {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = Arc::new(ToolContext::new(
            tmp.path().to_path_buf(),
            16 * 1024 * 1024,
            Arc::new(SessionStore::open_in_memory().unwrap()),
            Arc::new(JobSupervisor::new_in_memory()),
            ExecConfig::default(),
            SynthesisConfig::default(),
            "test workflow prompt".to_string(),
            ToolFilter::All,
        ));
        let registry = Arc::new(build_registry(ctx.clone()));
        let executor = Arc::new(ToolExecutor::new(registry, ctx));
        (tmp, EdaMcpServer::new(executor))
    }

    #[test]
    fn get_info_enables_tools_and_resources() {
        let (_tmp, server) = make_server();
        let info = server.get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
    }

    #[test]
    fn server_is_cloneable() {
        let (_tmp, server) = make_server();
        let _clone = server.clone();
    }

    #[test]
    fn current_session_defaults_without_active_session() {
        let (_tmp, server) = make_server();
        assert_eq!(server.current_session(), "default");
    }
}
