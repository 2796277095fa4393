use serde::Serialize;

/// Structured trace events emitted across this workspace's crates, in
/// addition to ordinary `tracing` spans. Each is logged as a single
/// `tracing::info!` line carrying the serialized event as a field, so
/// operators can `grep`/pipe-to-jq for a specific event kind without
/// needing a full OTel collector.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_id: String,
        is_new: bool,
    },
    SessionReset {
        session_id: String,
        reason: String,
    },
    TurnAppended {
        session_id: String,
        role: String,
    },
    ToolDispatched {
        call_id: String,
        tool_name: String,
        duration_ms: u64,
        status: String,
    },
    JobTransitioned {
        run_id: String,
        session_id: String,
        from: String,
        to: String,
        stage: Option<String>,
    },
    LlmRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    AgentLoopIteration {
        session_id: String,
        iteration: u32,
        had_tool_calls: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "agent_event");
    }
}
