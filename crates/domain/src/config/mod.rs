mod agent_loop;
mod llm;
mod observability;
mod server;
mod sessions;
mod synthesis;
mod tools;
mod workspace;

pub use agent_loop::*;
pub use llm::*;
pub use observability::*;
pub use server::*;
pub use sessions::*;
pub use synthesis::*;
pub use tools::*;
pub use workspace::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub agent_loop: AgentLoopConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good. Any `Error`
    /// severity issue should abort startup; `Warning` issues are logged
    /// but non-fatal.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        // LLM provider.
        if self.llm.provider.id.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.provider.id".into(),
                message: "provider id must not be empty".into(),
            });
        }
        if self.llm.provider.base_url.is_empty()
            || (!self.llm.provider.base_url.starts_with("http://")
                && !self.llm.provider.base_url.starts_with("https://"))
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.provider.base_url".into(),
                message: format!(
                    "base_url must start with http:// or https:// (got \"{}\")",
                    self.llm.provider.base_url
                ),
            });
        }
        let needs_credentials = matches!(self.llm.provider.auth.mode, AuthMode::ApiKey);
        if needs_credentials && self.llm.provider.auth.env.as_deref().unwrap_or("").is_empty() {
            errors.push(ConfigError {
                severity: if self.llm.require_provider {
                    ConfigSeverity::Error
                } else {
                    ConfigSeverity::Warning
                },
                field: "llm.provider.auth".into(),
                message: "provider uses ApiKey auth mode but has no auth.env configured".into(),
            });
        }

        // Exec timeouts.
        if self.tools.exec.soft_timeout_sec >= self.tools.exec.hard_timeout_sec {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.exec".into(),
                message: format!(
                    "soft_timeout_sec ({}) must be less than hard_timeout_sec ({})",
                    self.tools.exec.soft_timeout_sec, self.tools.exec.hard_timeout_sec
                ),
            });
        }

        // Synthesis stage list must be non-empty and non-duplicated.
        if self.synthesis.stage_names.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "synthesis.stage_names".into(),
                message: "no stage names configured; stuck-job progress detection degrades to log-line-only".into(),
            });
        }
        let mut seen_stages: HashSet<&str> = HashSet::new();
        for stage in &self.synthesis.stage_names {
            if !seen_stages.insert(stage.as_str()) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: "synthesis.stage_names".into(),
                    message: format!("duplicate stage name \"{stage}\""),
                });
            }
        }

        // Agent loop bounds.
        if self.agent_loop.max_iterations == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "agent_loop.max_iterations".into(),
                message: "max_iterations must be greater than 0".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.llm.provider.auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: Some("ANTHROPIC_API_KEY".into()),
            ..AuthConfig::default()
        };
        cfg
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn zero_port_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "server.port" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn missing_credentials_is_warning_unless_required() {
        let mut cfg = valid_config();
        cfg.llm.provider.auth.env = None;
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "llm.provider.auth")
            .expect("expected an auth issue");
        assert_eq!(issue.severity, ConfigSeverity::Warning);

        cfg.llm.require_provider = true;
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "llm.provider.auth")
            .expect("expected an auth issue");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn soft_timeout_must_be_less_than_hard_timeout() {
        let mut cfg = valid_config();
        cfg.tools.exec.soft_timeout_sec = 300;
        cfg.tools.exec.hard_timeout_sec = 120;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "tools.exec" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "server.cors.allowed_origins"
                && e.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn duplicate_stage_names_is_warning() {
        let mut cfg = valid_config();
        cfg.synthesis.stage_names = vec!["synthesis".into(), "synthesis".into()];
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "synthesis.stage_names" && e.message.contains("duplicate")));
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] server.port: port must be greater than 0"
        );
    }
}
