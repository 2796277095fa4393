use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent loop (ReAct control core)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLoopConfig {
    /// Hard cap on model/tool iterations within a single user turn.
    #[serde(default = "d_max_iterations")]
    pub max_iterations: u32,
    /// Soft wall-clock budget for a single turn, in seconds.
    #[serde(default = "d_turn_budget")]
    pub turn_budget_sec: u64,
    /// System prompt prepended to every composed conversation. Hardware
    /// design knowledge belongs here, not in code — this default is a
    /// minimal placeholder meant to be overridden per deployment.
    #[serde(default = "d_system_prompt")]
    pub system_prompt: String,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: d_max_iterations(),
            turn_budget_sec: d_turn_budget(),
            system_prompt: d_system_prompt(),
        }
    }
}

fn d_max_iterations() -> u32 {
    40
}
fn d_turn_budget() -> u64 {
    600
}
fn d_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

/// Fallback system prompt used when no deployment-specific prompt is
/// configured. Describes the toolbox, not chip design itself.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an autonomous hardware design agent. You turn a natural-language \
request into synthesized RTL by calling the tools available to you: write \
and read the design spec, write and edit Verilog/SystemVerilog files, lint \
and simulate them, run formal and alternative-framework verification, then \
start and monitor a synthesis job and report its metrics. Work iteratively: \
after every tool result, decide whether to continue, retry with adjusted \
arguments, or stop because the request is satisfied.";
