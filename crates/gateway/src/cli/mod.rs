pub mod config;
pub mod doctor;
pub mod init;
pub mod mcp;
pub mod run;

use clap::{Parser, Subcommand};

/// eda-agent — an EDA hardware-design agent orchestration core.
#[derive(Debug, Parser)]
#[command(name = "eda-agent", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Initialize a new eda-agent project in the current directory.
    Init {
        /// Skip interactive prompts and use sensible defaults (Anthropic provider).
        #[arg(long)]
        defaults: bool,
    },
    /// Send a single message to the agent and print the response.
    Run {
        /// The message to send.
        message: String,
        /// Session id (defaults to "cli").
        #[arg(long, default_value = "cli")]
        session: String,
        /// Model override.
        #[arg(long)]
        model: Option<String>,
        /// Output the full response as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Serve the canonical tool registry as an MCP server.
    Mcp {
        #[command(subcommand)]
        transport: McpTransport,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum McpTransport {
    /// Serve over stdio (the default framing for local MCP clients).
    Stdio,
    /// Serve Server-Sent Events over HTTP.
    Sse {
        #[arg(long, default_value = "127.0.0.1:7890")]
        addr: String,
    },
    /// Serve the streamable-HTTP transport.
    StreamableHttp {
        #[arg(long, default_value = "127.0.0.1:7891")]
        addr: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load the configuration from the path named by `EDA_AGENT_CONFIG` (or
/// `config.toml` by default). Returns the parsed [`Config`] and the path
/// that was used. Shared by `serve`, `doctor`, `config`, and `run` so the
/// logic lives in one place.
pub fn load_config() -> anyhow::Result<(eda_domain::config::Config, String)> {
    let config_path = std::env::var("EDA_AGENT_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        eda_domain::config::Config::default()
    };

    Ok((config, config_path))
}
