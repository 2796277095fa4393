use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools (subprocess runner + tool filter policy)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub filter: ToolFilterConfig,
}

/// Subprocess runner configuration for EDA tool handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Soft timeout (seconds): send a polite termination signal.
    #[serde(default = "d_soft_timeout")]
    pub soft_timeout_sec: u64,
    /// Hard timeout (seconds): force-kill the process tree.
    #[serde(default = "d_hard_timeout")]
    pub hard_timeout_sec: u64,
    /// Bounded ring buffer size per stream (stdout, stderr), in bytes.
    #[serde(default = "d_buffer_cap")]
    pub output_buffer_bytes: usize,
    /// Environment variable names stripped from every subprocess's environment.
    #[serde(default = "d_denied_env_vars")]
    pub denied_env_vars: Vec<String>,
    /// How often the background process/ring-buffer janitor runs (seconds).
    #[serde(default = "d_cleanup_interval")]
    pub cleanup_interval_sec: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            soft_timeout_sec: d_soft_timeout(),
            hard_timeout_sec: d_hard_timeout(),
            output_buffer_bytes: d_buffer_cap(),
            denied_env_vars: d_denied_env_vars(),
            cleanup_interval_sec: d_cleanup_interval(),
        }
    }
}

/// Tool-visibility filter. Controls which tools are exposed to the model
/// (and to MCP `tools/list`) for a given session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFilterConfig {
    #[serde(default)]
    pub default_mode: ToolFilterMode,
    /// Category set used when `default_mode == Custom`.
    #[serde(default)]
    pub default_categories: Vec<String>,
}

impl Default for ToolFilterConfig {
    fn default() -> Self {
        Self {
            default_mode: ToolFilterMode::All,
            default_categories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolFilterMode {
    #[default]
    All,
    Essential,
    Custom,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_soft_timeout() -> u64 {
    120
}
fn d_hard_timeout() -> u64 {
    300
}
fn d_buffer_cap() -> usize {
    2 * 1024 * 1024
}
fn d_cleanup_interval() -> u64 {
    60
}
fn d_denied_env_vars() -> Vec<String> {
    vec![
        "LD_PRELOAD".into(),
        "LD_LIBRARY_PATH".into(),
        "DYLD_INSERT_LIBRARIES".into(),
        "BASH_ENV".into(),
        "ENV".into(),
    ]
}
