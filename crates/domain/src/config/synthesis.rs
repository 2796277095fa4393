use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Synthesis jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the Job Supervisor's synthesis runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Container image reference for the synthesis flow.
    #[serde(default = "d_image")]
    pub image: String,
    /// Command template. `{spec}`, `{workdir}`, and `{clock_period}` are
    /// substituted by the job supervisor before invocation.
    #[serde(default = "d_recipe")]
    pub invocation_recipe: String,
    /// Hard timeout for a synthesis run (seconds).
    #[serde(default = "d_hard_timeout")]
    pub hard_timeout_sec: u64,
    /// Age, in seconds, after which a running job with no new progress
    /// is considered stuck.
    #[serde(default = "d_stuck_threshold")]
    pub stuck_threshold_sec: u64,
    /// Ordered stage-boundary names used for progress detection. Data,
    /// not a compiled-in constant, since the external flow's log
    /// conventions vary by target and tool version.
    #[serde(default = "d_stages")]
    pub stage_names: Vec<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            image: d_image(),
            invocation_recipe: d_recipe(),
            hard_timeout_sec: d_hard_timeout(),
            stuck_threshold_sec: d_stuck_threshold(),
            stage_names: d_stages(),
        }
    }
}

fn d_image() -> String {
    "openlane:latest".into()
}
fn d_recipe() -> String {
    "flow.tcl -design {workdir} -spec {spec} -clock_period {clock_period}".into()
}
fn d_hard_timeout() -> u64 {
    1800
}
fn d_stuck_threshold() -> u64 {
    300
}
fn d_stages() -> Vec<String> {
    vec![
        "synthesis".into(),
        "floorplan".into(),
        "placement".into(),
        "cts".into(),
        "routing".into(),
        "signoff".into(),
    ]
}
