//! A scripted [`LlmProvider`] for integration tests.
//!
//! Each call to `chat`/`chat_stream` pops the next [`ScriptedStep`] off a
//! shared queue and replays it, so a test can script a whole multi-turn
//! ReAct exchange (tool calls, a fix, a final answer) up front and hand
//! the agent loop a provider that behaves exactly like a model following
//! that script, without a network call.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use eda_domain::capability::{LlmCapabilities, ToolSupport};
use eda_domain::error::{Error, Result};
use eda_domain::stream::{BoxStream, StreamEvent, Usage};
use eda_domain::tool::ToolCall;

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};

/// One tool call the script hands back as part of a `ToolCalls` step.
#[derive(Debug, Clone)]
pub struct ScriptedCall {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

impl ScriptedCall {
    pub fn new(tool_name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// The model emits text and stops (no tool calls) — a terminal turn.
    Final(String),
    /// The model emits these tool calls and nothing else.
    ToolCalls(Vec<ScriptedCall>),
    /// The model call itself fails, as if the wire adapter returned an error.
    Error(String),
}

/// Scripted [`LlmProvider`]: every call pops the next step off the queue.
/// Running past the end of the script is a test-authoring bug, not a
/// recoverable condition, so it returns `Error::Provider` rather than
/// panicking the agent loop.
pub struct StubProvider {
    steps: Mutex<VecDeque<ScriptedStep>>,
    capabilities: LlmCapabilities,
    id: String,
}

impl StubProvider {
    pub fn scripted(id: impl Into<String>, steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            capabilities: LlmCapabilities {
                supports_tools: ToolSupport::Basic,
                supports_streaming: true,
                supports_json_mode: false,
                supports_vision: false,
                context_window_tokens: Some(200_000),
                max_output_tokens: Some(8_192),
            },
            id: id.into(),
        }
    }

    fn next_step(&self) -> Result<ScriptedStep> {
        self.steps.lock().unwrap().pop_front().ok_or_else(|| Error::Provider {
            provider: self.id.clone(),
            message: "stub provider script exhausted".to_string(),
        })
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse> {
        match self.next_step()? {
            ScriptedStep::Final(text) => Ok(ChatResponse {
                content: text,
                tool_calls: Vec::new(),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 10,
                    total_tokens: 20,
                }),
                model: self.id.clone(),
                finish_reason: Some("stop".to_string()),
            }),
            ScriptedStep::ToolCalls(calls) => Ok(ChatResponse {
                content: String::new(),
                tool_calls: calls
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| ToolCall {
                        call_id: format!("call_{i}"),
                        tool_name: c.tool_name,
                        arguments: c.arguments,
                    })
                    .collect(),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 10,
                    total_tokens: 20,
                }),
                model: self.id.clone(),
                finish_reason: Some("tool_calls".to_string()),
            }),
            ScriptedStep::Error(message) => Err(Error::Provider {
                provider: self.id.clone(),
                message,
            }),
        }
    }

    async fn chat_stream(&self, _req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let step = self.next_step()?;
        let stream = async_stream::stream! {
            match step {
                ScriptedStep::Final(text) => {
                    yield Ok(StreamEvent::Token { text });
                    yield Ok(StreamEvent::Done {
                        usage: Some(Usage { prompt_tokens: 10, completion_tokens: 10, total_tokens: 20 }),
                        finish_reason: Some("stop".to_string()),
                    });
                }
                ScriptedStep::ToolCalls(calls) => {
                    for (i, call) in calls.into_iter().enumerate() {
                        let call_id = format!("call_{i}");
                        yield Ok(StreamEvent::ToolCallStarted {
                            call_id: call_id.clone(),
                            tool_name: call.tool_name.clone(),
                        });
                        yield Ok(StreamEvent::ToolCallFinished {
                            call_id,
                            tool_name: call.tool_name,
                            arguments: call.arguments,
                        });
                    }
                    yield Ok(StreamEvent::Done {
                        usage: Some(Usage { prompt_tokens: 10, completion_tokens: 10, total_tokens: 20 }),
                        finish_reason: Some("tool_calls".to_string()),
                    });
                }
                ScriptedStep::Error(message) => {
                    yield Ok(StreamEvent::Error { message });
                }
            }
        };
        Ok(Box::pin(stream))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
