use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Data root: holds the session database and the `jobs/`/`runs/` ledgers.
    #[serde(default = "d_data_root")]
    pub data_root: PathBuf,
    /// Subdirectory name (under `data_root`) holding per-session workspaces.
    #[serde(default = "d_workspace_dir")]
    pub workspace_dir: String,
    /// Per-file write size cap, in bytes.
    #[serde(default = "d_file_cap")]
    pub max_file_bytes: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            data_root: d_data_root(),
            workspace_dir: d_workspace_dir(),
            max_file_bytes: d_file_cap(),
        }
    }
}

impl WorkspaceConfig {
    pub fn workspaces_root(&self) -> PathBuf {
        self.data_root.join(&self.workspace_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_root.join("sessions.sqlite3")
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.data_root.join("jobs").join("ledger.jsonl")
    }

    pub fn runs_path(&self) -> PathBuf {
        self.data_root.join("runs").join("ledger.jsonl")
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_data_root() -> PathBuf {
    PathBuf::from("./data")
}
fn d_workspace_dir() -> String {
    "workspace".into()
}
fn d_file_cap() -> u64 {
    16 * 1024 * 1024
}
