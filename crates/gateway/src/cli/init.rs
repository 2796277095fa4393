use std::path::Path;

// ── Provider presets ─────────────────────────────────────────────────

struct ProviderPreset {
    id: &'static str,
    kind: &'static str,
    base_url: &'static str,
    env_var: &'static str,
}

const ANTHROPIC: ProviderPreset = ProviderPreset {
    id: "anthropic",
    kind: "anthropic",
    base_url: "https://api.anthropic.com",
    env_var: "ANTHROPIC_API_KEY",
};

const OPENAI_COMPAT: ProviderPreset = ProviderPreset {
    id: "openai",
    kind: "openai_compat",
    base_url: "https://api.openai.com/v1",
    env_var: "OPENAI_API_KEY",
};

// ── Public entry point ───────────────────────────────────────────────

/// Scaffold a new eda-agent project in the current directory.
///
/// When `use_defaults` is `true` the Anthropic preset is used without any
/// interactive prompts. Otherwise the user is asked to pick a provider.
pub fn init(use_defaults: bool) -> anyhow::Result<()> {
    init_in(Path::new("."), use_defaults)
}

// ── Core implementation (directory-parameterised for testability) ─────

fn init_in(base: &Path, use_defaults: bool) -> anyhow::Result<()> {
    let config_path = base.join("config.toml");

    if config_path.exists() {
        anyhow::bail!("config.toml already exists. Use a different directory or remove it first.");
    }

    let (provider_id, kind, base_url, env_var) = if use_defaults {
        (
            ANTHROPIC.id.to_owned(),
            ANTHROPIC.kind.to_owned(),
            ANTHROPIC.base_url.to_owned(),
            ANTHROPIC.env_var.to_owned(),
        )
    } else {
        prompt_provider()?
    };

    let config_content = render_config(&provider_id, &kind, &base_url, &env_var);
    let env_content = render_dotenv(&env_var);

    std::fs::write(&config_path, config_content)?;
    std::fs::write(base.join(".env"), env_content)?;

    std::fs::create_dir_all(base.join("data/workspace"))?;
    std::fs::create_dir_all(base.join("data/jobs"))?;
    std::fs::create_dir_all(base.join("data/runs"))?;

    eprintln!();
    eprintln!("  eda-agent project initialized!");
    eprintln!();
    eprintln!("  Created:");
    eprintln!("    config.toml      - gateway configuration");
    eprintln!("    .env             - environment variables (add your API key)");
    eprintln!("    data/workspace/  - per-session design workspaces");
    eprintln!("    data/jobs/       - synthesis job ledger");
    eprintln!("    data/runs/       - agent-loop execution trace ledger");
    eprintln!();
    eprintln!("  Next steps:");
    eprintln!("    1. Add your API key to .env");
    eprintln!("    2. Run `eda-agent doctor` to verify the setup");
    eprintln!("    3. Run `eda-agent` to start the gateway");
    eprintln!();

    Ok(())
}

// ── Interactive provider selection ───────────────────────────────────

fn prompt_provider() -> anyhow::Result<(String, String, String, String)> {
    eprintln!();
    eprintln!("  Welcome to eda-agent!");
    eprintln!("  Let's set up your project.\n");

    let choice = prompt("  Which LLM provider?\n  [1] Anthropic  [2] OpenAI-compatible  [3] Other\n  >");

    match choice.as_str() {
        "1" => Ok((
            ANTHROPIC.id.to_owned(),
            ANTHROPIC.kind.to_owned(),
            ANTHROPIC.base_url.to_owned(),
            ANTHROPIC.env_var.to_owned(),
        )),
        "2" => Ok((
            OPENAI_COMPAT.id.to_owned(),
            OPENAI_COMPAT.kind.to_owned(),
            OPENAI_COMPAT.base_url.to_owned(),
            OPENAI_COMPAT.env_var.to_owned(),
        )),
        "3" => prompt_custom_provider(),
        _ => {
            eprintln!("  Invalid choice, defaulting to Anthropic.");
            Ok((
                ANTHROPIC.id.to_owned(),
                ANTHROPIC.kind.to_owned(),
                ANTHROPIC.base_url.to_owned(),
                ANTHROPIC.env_var.to_owned(),
            ))
        }
    }
}

fn prompt_custom_provider() -> anyhow::Result<(String, String, String, String)> {
    let provider_id = prompt("  Provider ID (e.g. \"my-llm\"):");
    let base_url = prompt("  Base URL (e.g. \"https://api.example.com/v1\"):");
    let env_var = prompt("  Environment variable for the API key (e.g. \"MY_LLM_API_KEY\"):");

    if provider_id.is_empty() || base_url.is_empty() || env_var.is_empty() {
        anyhow::bail!("All fields are required for a custom provider.");
    }

    Ok((provider_id, OPENAI_COMPAT.kind.to_owned(), base_url, env_var))
}

fn prompt(question: &str) -> String {
    eprint!("{question} ");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input).unwrap_or_default();
    input.trim().to_string()
}

// ── Template rendering ───────────────────────────────────────────────

fn render_config(provider_id: &str, kind: &str, base_url: &str, env_var: &str) -> String {
    format!(
        r#"# eda-agent configuration

[server]
port = 3210
host = "127.0.0.1"

[llm]
require_provider = false

[llm.provider]
id = "{provider_id}"
kind = "{kind}"
base_url = "{base_url}"

[llm.provider.auth]
mode = "api_key"
env = "{env_var}"

[workspace]
data_root = "./data"

[synthesis]
image = "openlane:latest"
"#
    )
}

fn render_dotenv(env_var: &str) -> String {
    format!("# eda-agent environment variables\n{env_var}=your-api-key-here\n")
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_config_contains_provider_fields() {
        let output = render_config("anthropic", "anthropic", "https://api.anthropic.com", "ANTHROPIC_API_KEY");

        assert!(output.contains("id = \"anthropic\""));
        assert!(output.contains("base_url = \"https://api.anthropic.com\""));
        assert!(output.contains("env = \"ANTHROPIC_API_KEY\""));
    }

    #[test]
    fn render_config_contains_structure() {
        let output = render_config("test", "openai_compat", "https://example.com", "TEST_KEY");

        assert!(output.contains("[server]"));
        assert!(output.contains("port = 3210"));
        assert!(output.contains("[llm.provider]"));
        assert!(output.contains("[llm.provider.auth]"));
        assert!(output.contains("[workspace]"));
    }

    #[test]
    fn render_dotenv_contains_env_var() {
        let output = render_dotenv("OPENAI_API_KEY");

        assert!(output.contains("OPENAI_API_KEY=your-api-key-here"));
        assert!(output.starts_with("# eda-agent environment variables"));
    }

    #[test]
    fn init_fails_when_config_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "existing").unwrap();

        let result = init_in(dir.path(), true);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("config.toml already exists"));
    }

    #[test]
    fn init_defaults_creates_expected_files() {
        let dir = tempfile::tempdir().unwrap();

        let result = init_in(dir.path(), true);
        assert!(result.is_ok());

        assert!(dir.path().join("config.toml").exists());
        assert!(dir.path().join(".env").exists());
        assert!(dir.path().join("data/workspace").is_dir());
        assert!(dir.path().join("data/jobs").is_dir());
        assert!(dir.path().join("data/runs").is_dir());

        let config = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
        assert!(config.contains("id = \"anthropic\""));
        assert!(config.contains("env = \"ANTHROPIC_API_KEY\""));

        let dotenv = std::fs::read_to_string(dir.path().join(".env")).unwrap();
        assert!(dotenv.contains("ANTHROPIC_API_KEY=your-api-key-here"));
    }
}
