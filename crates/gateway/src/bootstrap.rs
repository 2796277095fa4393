//! [`AppState`] construction and background-task spawning, shared by the
//! `serve` and `run` CLI commands so both boot the identical runtime.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use eda_domain::config::{Config, ConfigSeverity};
use eda_providers::registry::ProviderRegistry;
use eda_sessions::store::SessionStore;
use eda_tools::executor::{ToolContext, ToolExecutor};
use eda_tools::job::JobSupervisor;
use eda_tools::registry::{build_registry, ToolFilter};

use crate::runtime::bus::StreamingBus;
use crate::runtime::cancel::CancelMap;
use crate::runtime::runs::RunStore;
use crate::runtime::session_lock::SessionLockMap;
use crate::state::AppState;

/// Validate config, initialize every subsystem, and return a fully-wired
/// [`AppState`]. Shared by `serve` and `run`; neither starts background
/// tasks on its own — call [`spawn_background_tasks`] for `serve` only.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    std::fs::create_dir_all(&config.workspace.data_root)
        .context("creating data root directory")?;
    std::fs::create_dir_all(config.workspace.workspaces_root())
        .context("creating workspace root directory")?;

    let sessions = Arc::new(
        SessionStore::new(&config.workspace.db_path()).context("initializing session store")?,
    );
    tracing::info!(path = %config.workspace.db_path().display(), "session store ready");

    let jobs = Arc::new(JobSupervisor::new(
        config.workspace.jobs_path(),
        config.synthesis.clone(),
    ));
    tracing::info!("job supervisor ready");

    let default_filter = match config.tools.filter.default_mode {
        eda_domain::config::ToolFilterMode::All => ToolFilter::All,
        eda_domain::config::ToolFilterMode::Essential => ToolFilter::Essential,
        eda_domain::config::ToolFilterMode::Custom => {
            let categories = config
                .tools
                .filter
                .default_categories
                .iter()
                .filter_map(|c| parse_category(c))
                .collect();
            ToolFilter::Custom { categories }
        }
    };

    let ctx = Arc::new(ToolContext::new(
        config.workspace.workspaces_root(),
        config.workspace.max_file_bytes,
        sessions.clone(),
        jobs.clone(),
        config.tools.exec.clone(),
        config.synthesis.clone(),
        config.agent_loop.system_prompt.clone(),
        default_filter,
    ));
    let registry = Arc::new(build_registry(ctx.clone()));
    tracing::info!(tool_count = registry.len(), "tool registry ready");
    let executor = Arc::new(ToolExecutor::new(registry, ctx));

    let providers = Arc::new(
        ProviderRegistry::from_config(&config.llm).context("initializing LLM provider")?,
    );
    if providers.is_ready() {
        tracing::info!(provider_id = providers.provider().unwrap().provider_id(), "LLM provider ready");
    } else if let Some(err) = providers.init_error() {
        tracing::warn!(provider_id = %err.provider_id, error = %err.error, "LLM provider not initialized");
    }

    let bus = Arc::new(StreamingBus::new());
    let runs = Arc::new(RunStore::new(&config.workspace.data_root));
    let cancel_map = Arc::new(CancelMap::new());
    let locks = Arc::new(SessionLockMap::new());

    let api_token_hash = {
        let env_var = &config.server.api_token_env;
        match std::env::var(env_var) {
            Ok(token) if !token.is_empty() => {
                tracing::info!(env_var = %env_var, "API bearer-token auth enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            _ => {
                tracing::warn!(
                    env_var = %env_var,
                    "API bearer-token auth DISABLED — set {env_var} to enable"
                );
                None
            }
        }
    };

    Ok(AppState {
        config,
        sessions,
        executor,
        jobs,
        providers,
        bus,
        runs,
        cancel_map,
        locks,
        api_token_hash,
    })
}

fn parse_category(name: &str) -> Option<eda_domain::tool::ToolCategory> {
    use eda_domain::tool::ToolCategory::*;
    match name {
        "essential" => Some(Essential),
        "verification" => Some(Verification),
        "synthesis" => Some(Synthesis),
        "editing" => Some(Editing),
        "reporting" => Some(Reporting),
        "session" => Some(Session),
        "other" => Some(Other),
        _ => {
            tracing::warn!(category = %name, "unknown tool category in config, ignoring");
            None
        }
    }
}

/// Spawn long-running background tasks: session-lock pruning and
/// streaming-bus idle-channel pruning. Call after [`build_app_state`] for
/// the `serve` command only — one-shot CLI commands exit before these
/// would matter.
pub fn spawn_background_tasks(state: &AppState) {
    {
        let locks = state.locks.clone();
        let bus = state.bus.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                locks.prune_idle();
                bus.prune_idle();
            }
        });
    }
    tracing::info!("background tasks spawned");
}
