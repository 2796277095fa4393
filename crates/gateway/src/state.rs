use std::sync::Arc;

use eda_domain::config::Config;
use eda_providers::registry::ProviderRegistry;
use eda_sessions::store::SessionStore;
use eda_tools::executor::ToolExecutor;
use eda_tools::job::JobSupervisor;

use crate::runtime::bus::StreamingBus;
use crate::runtime::cancel::CancelMap;
use crate::runtime::runs::RunStore;
use crate::runtime::session_lock::SessionLockMap;
use crate::runtime::turn::TurnState;

/// Shared application state passed to every API handler and CLI command.
///
/// One instance is built at startup by [`crate::bootstrap::build_app_state`]
/// and cloned (cheaply, everything behind an `Arc`) into each axum handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub executor: Arc<ToolExecutor>,
    pub jobs: Arc<JobSupervisor>,
    pub providers: Arc<ProviderRegistry>,
    pub bus: Arc<StreamingBus>,
    pub runs: Arc<RunStore>,
    pub cancel_map: Arc<CancelMap>,
    pub locks: Arc<SessionLockMap>,
    /// SHA-256 hash of the API bearer token, read once at startup.
    /// `None` means auth is disabled (dev mode).
    pub api_token_hash: Option<Vec<u8>>,
}

impl AppState {
    /// Bundle the subset of state a turn needs into a [`TurnState`].
    pub fn turn_state(&self) -> Arc<TurnState> {
        Arc::new(TurnState {
            sessions: self.sessions.clone(),
            executor: self.executor.clone(),
            providers: self.providers.clone(),
            bus: self.bus.clone(),
            runs: self.runs.clone(),
            cancel_map: self.cancel_map.clone(),
            locks: self.locks.clone(),
            agent_loop: self.config.agent_loop.clone(),
        })
    }
}
