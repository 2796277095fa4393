use eda_domain::config::{Config, ConfigSeverity};
use eda_providers::registry::ProviderRegistry;

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("eda-agent doctor");
    println!("================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_llm_provider(config, &mut all_passed);
    check_workspace(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_llm_provider(config: &Config, all_passed: &mut bool) {
    match ProviderRegistry::from_config(&config.llm) {
        Ok(registry) if registry.is_ready() => {
            print_check(
                "LLM provider configured",
                true,
                format!("{} ({:?})", config.llm.provider.id, config.llm.provider.kind),
            );
        }
        Ok(registry) => {
            let detail = registry
                .init_error()
                .map(|e| e.error.clone())
                .unwrap_or_else(|| "not initialized".into());
            print_check("LLM provider configured", false, detail);
            *all_passed = false;
        }
        Err(e) => {
            print_check("LLM provider configured", false, e.to_string());
            *all_passed = false;
        }
    }
}

fn check_workspace(config: &Config, all_passed: &mut bool) {
    let path = config.workspace.workspaces_root();
    if let Err(e) = std::fs::create_dir_all(&path) {
        print_check(
            "Workspace directory",
            false,
            format!("{} (failed to create: {e})", path.display()),
        );
        *all_passed = false;
        return;
    }

    let probe = path.join(".eda_agent_doctor_probe");
    let writable = std::fs::write(&probe, b"probe").is_ok();
    let _ = std::fs::remove_file(&probe);

    let detail = if writable {
        format!("{} (writable)", path.display())
    } else {
        format!("{} (not writable)", path.display())
    };
    print_check("Workspace directory", writable, detail);
    if !writable {
        *all_passed = false;
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
