//! `eda-agent mcp` — serve the canonical tool registry over one of the
//! three MCP framings without starting the chat/REST gateway.

use std::sync::Arc;

use eda_domain::config::Config;

use crate::bootstrap;
use crate::cli::McpTransport;

pub async fn run(config: Arc<Config>, transport: McpTransport) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;
    let executor = state.executor.clone();

    match transport {
        McpTransport::Stdio => {
            tracing::info!("serving MCP over stdio");
            eda_mcp::serve_stdio(executor).await
        }
        McpTransport::Sse { addr } => {
            tracing::info!(%addr, "serving MCP over SSE");
            eda_mcp::serve_sse(executor, &addr).await
        }
        McpTransport::StreamableHttp { addr } => {
            tracing::info!(%addr, "serving MCP over streamable HTTP");
            eda_mcp::serve_streamable_http(executor, &addr).await
        }
    }
}
