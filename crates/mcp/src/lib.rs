//! Tool-protocol transport: exposes the same [`eda_tools::ToolExecutor`]
//! the chat and REST transports use as a Model Context Protocol server.
//!
//! `tools/list` and `tools/call` run through [`EdaMcpServer`]; the actual
//! tool dispatch never duplicates what `eda_tools` already does.

pub mod bridge;
pub mod server;

pub use server::EdaMcpServer;

use std::sync::Arc;

use eda_tools::ToolExecutor;
use rmcp::ServiceExt;

/// Run the MCP server over stdio until the client disconnects.
///
/// This is the transport a local client (an editor, a CLI) speaks when it
/// launches the agent as a subprocess rather than connecting over HTTP.
/// Blocks until stdin closes or the process is terminated.
pub async fn serve_stdio(executor: Arc<ToolExecutor>) -> anyhow::Result<()> {
    let server = EdaMcpServer::new(executor);
    let running = server
        .serve((tokio::io::stdin(), tokio::io::stdout()))
        .await
        .map_err(|e| anyhow::anyhow!("MCP server init error: {e}"))?;
    running
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
    Ok(())
}

/// Run the MCP server over Server-Sent Events, binding `addr`.
///
/// Every SSE connection gets its own [`EdaMcpServer`] instance, all
/// sharing the one `Arc<ToolExecutor>` — tool dispatch and the
/// per-session bookkeeping in `ToolContext` are already safe to share
/// across concurrent connections.
pub async fn serve_sse(executor: Arc<ToolExecutor>, addr: &str) -> anyhow::Result<()> {
    use rmcp::transport::sse_server::SseServer;

    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid MCP SSE bind address '{addr}': {e}"))?;

    let ct = SseServer::serve(socket_addr)
        .await
        .map_err(|e| anyhow::anyhow!("binding MCP SSE server to {addr}: {e}"))?
        .with_service(move || EdaMcpServer::new(executor.clone()));

    tracing::info!(%addr, "MCP SSE server listening");
    ct.cancelled().await;
    Ok(())
}

/// Run the MCP server over the streamable-HTTP transport, binding `addr`.
///
/// Session state (one logical MCP session per HTTP session id) is kept
/// in-process via `LocalSessionManager` — this core runs as a single
/// gateway process, not a horizontally-scaled fleet sharing MCP sessions.
pub async fn serve_streamable_http(executor: Arc<ToolExecutor>, addr: &str) -> anyhow::Result<()> {
    use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
    use rmcp::transport::streamable_http_server::StreamableHttpService;

    let service = StreamableHttpService::new(
        move || Ok(EdaMcpServer::new(executor.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("binding MCP streamable-HTTP server to {addr}: {e}"))?;

    tracing::info!(%addr, "MCP streamable-HTTP server listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| anyhow::anyhow!("MCP streamable-HTTP server error: {e}"))?;
    Ok(())
}
