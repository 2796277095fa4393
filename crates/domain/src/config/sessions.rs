use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// One session per design project, addressed directly by the caller's
// chosen id. There is no multi-channel identity resolution here: each
// transport passes (or the store generates) a session id explicitly.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// How often the background flush/checkpoint loop runs (seconds).
    #[serde(default = "d_flush_interval")]
    pub flush_interval_sec: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            flush_interval_sec: d_flush_interval(),
        }
    }
}

fn d_flush_interval() -> u64 {
    30
}
